// web-server/src/api/games.rs
use actix::Addr;
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use common::models::cerebro::CerebroMove;
use common::models::channel::ChannelId;
use common::{CreateGameRequest, MoveRequest};
use uuid::Uuid;

use super::auth::authenticate;
use super::ok;
use crate::error::ApiError;
use crate::game_registry::GameRegistry;
use crate::session_store::SessionKeyStore;

#[post("/games")]
pub async fn create_game(
    req: HttpRequest,
    body: web::Json<CreateGameRequest>,
    store: web::Data<Addr<SessionKeyStore>>,
    games: web::Data<GameRegistry>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &store).await?;
    let CreateGameRequest { participants, channel_id, grid_size } = body.into_inner();

    let game = games
        .create_game(&caller, participants, grid_size, channel_id.map(ChannelId::from))
        .await?;
    Ok(ok(game))
}

#[get("/games/{game_id}")]
pub async fn get_game(
    req: HttpRequest,
    path: web::Path<(Uuid,)>,
    store: web::Data<Addr<SessionKeyStore>>,
    games: web::Data<GameRegistry>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &store).await?;
    Ok(ok(games.get_game(&caller, path.into_inner().0).await?))
}

// The authenticated wallet is the mover
#[post("/games/{game_id}/moves")]
pub async fn play_move(
    req: HttpRequest,
    path: web::Path<(Uuid,)>,
    body: web::Json<MoveRequest>,
    store: web::Data<Addr<SessionKeyStore>>,
    games: web::Data<GameRegistry>,
) -> Result<HttpResponse, ApiError> {
    let player = authenticate(&req, &store).await?;
    let MoveRequest { action, x, y } = body.into_inner();

    let game = games
        .play(path.into_inner().0, CerebroMove { player, action, x, y })
        .await?;
    Ok(ok(game))
}

// Either player can end the game; it is gone afterwards
#[delete("/games/{game_id}")]
pub async fn end_game(
    req: HttpRequest,
    path: web::Path<(Uuid,)>,
    store: web::Data<Addr<SessionKeyStore>>,
    games: web::Data<GameRegistry>,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, &store).await?;
    Ok(ok(games.end_game(&caller, path.into_inner().0).await?))
}
