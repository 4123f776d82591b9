// web-server/src/api/channels.rs
use actix::Addr;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use common::models::channel::{ChannelId, ChannelState};
use common::{ChallengeChannelRequest, ChannelClosedResponse, CloseChannelRequest, CreateChannelRequest};

use super::auth::authenticate;
use super::ok;
use crate::channel_service::ChannelService;
use crate::error::ApiError;
use crate::session_store::SessionKeyStore;

const DEFAULT_CLOSE_REASON: &str = "cooperative close";

#[post("/channels")]
pub async fn create_channel(
    req: HttpRequest,
    body: web::Json<CreateChannelRequest>,
    store: web::Data<Addr<SessionKeyStore>>,
    channels: web::Data<ChannelService>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &store).await?;
    let CreateChannelRequest { participants, initial_allocation } = body.into_inner();

    let record = channels.create_channel(&caller, participants, initial_allocation).await?;
    Ok(ok(record))
}

#[get("/channels")]
pub async fn list_channels(
    req: HttpRequest,
    store: web::Data<Addr<SessionKeyStore>>,
    channels: web::Data<ChannelService>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &store).await?;
    Ok(ok(channels.list_channels(&caller)))
}

#[get("/channels/{channel_id}")]
pub async fn get_channel(
    req: HttpRequest,
    path: web::Path<(String,)>,
    store: web::Data<Addr<SessionKeyStore>>,
    channels: web::Data<ChannelService>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &store).await?;
    let channel_id = ChannelId::from(path.into_inner().0);
    Ok(ok(channels.get_channel(&caller, &channel_id)?))
}

// The clearnode's view of the channel
#[get("/channels/{channel_id}/remote")]
pub async fn get_remote_channel(
    req: HttpRequest,
    path: web::Path<(String,)>,
    store: web::Data<Addr<SessionKeyStore>>,
    channels: web::Data<ChannelService>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &store).await?;
    let channel_id = ChannelId::from(path.into_inner().0);
    Ok(ok(channels.remote_channel(&caller, &channel_id).await?))
}

#[post("/channels/{channel_id}/state")]
pub async fn update_channel_state(
    req: HttpRequest,
    path: web::Path<(String,)>,
    body: web::Json<ChannelState>,
    store: web::Data<Addr<SessionKeyStore>>,
    channels: web::Data<ChannelService>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &store).await?;
    let channel_id = ChannelId::from(path.into_inner().0);

    let record = channels
        .update_channel_state(&caller, &channel_id, body.into_inner())
        .await?;
    Ok(ok(record))
}

#[post("/channels/{channel_id}/close")]
pub async fn close_channel(
    req: HttpRequest,
    path: web::Path<(String,)>,
    body: web::Json<CloseChannelRequest>,
    store: web::Data<Addr<SessionKeyStore>>,
    channels: web::Data<ChannelService>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &store).await?;
    let channel_id = ChannelId::from(path.into_inner().0);
    let CloseChannelRequest { final_state, reason } = body.into_inner();
    let reason = reason.unwrap_or_else(|| DEFAULT_CLOSE_REASON.to_string());

    let result = channels
        .close_channel(&caller, &channel_id, final_state, &reason)
        .await?;

    Ok(ok(ChannelClosedResponse {
        channel_id: result.channel_id.to_string(),
        final_version: result.final_version,
        closed_at: channels.registry().now(),
    }))
}

#[post("/channels/{channel_id}/challenge")]
pub async fn challenge_channel(
    req: HttpRequest,
    path: web::Path<(String,)>,
    body: web::Json<ChallengeChannelRequest>,
    store: web::Data<Addr<SessionKeyStore>>,
    channels: web::Data<ChannelService>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &store).await?;
    let channel_id = ChannelId::from(path.into_inner().0);

    let result = channels
        .challenge_channel(&caller, &channel_id, &body.reason)
        .await?;
    Ok(ok(result))
}
