// web-server/src/api/sessions.rs
use actix::Addr;
use actix_web::{get, post, delete, web, HttpRequest, HttpResponse, Responder};
use common::models::session::WalletSessionResponse;
use common::{Address, CleanupResponse, Config, CreateSessionRequest, ValidateSessionRequest, ValidateSessionResponse};
use serde_json::json;

use super::auth::{authenticate, SESSION_KEY_HEADER};
use super::ok;
use crate::error::ApiError;
use crate::utils::token::constant_time_eq;
use crate::session_store::{
    SessionKeyStore,
    CreateSession,
    GetActiveSession,
    ValidateSessionKey,
    Disconnect,
    CleanupExpiredSessions,
    GetSessionMetrics,
};

#[get("/")]
pub async fn api_index() -> impl Responder {
    ok(json!({
        "name": "Revatix API",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// Issue a session key for a wallet. A live key is only echoed back to a
// caller that already presents it in the session key header.
#[post("/sessions")]
pub async fn create_session(
    req: HttpRequest,
    body: web::Json<CreateSessionRequest>,
    store: web::Data<Addr<SessionKeyStore>>,
) -> Result<HttpResponse, ApiError> {
    let issued = store.send(CreateSession { address: body.into_inner().address }).await?;

    if issued.new_session {
        tracing::info!("Created new session for {}", issued.address);
        return Ok(ok(issued));
    }

    let holds_key = req
        .headers()
        .get(SESSION_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |presented| constant_time_eq(presented, &issued.session_key));

    if holds_key {
        tracing::info!("Returning existing session for {}", issued.address);
        Ok(ok(issued))
    } else {
        tracing::warn!("Session for {} already live, key withheld", issued.address);
        Ok(ok(WalletSessionResponse::from(&issued)))
    }
}

#[post("/sessions/validate")]
pub async fn validate_session(
    body: web::Json<ValidateSessionRequest>,
    store: web::Data<Addr<SessionKeyStore>>,
) -> Result<HttpResponse, ApiError> {
    let ValidateSessionRequest { address, session_key } = body.into_inner();
    let valid = store
        .send(ValidateSessionKey { address, session_key })
        .await?;

    Ok(ok(ValidateSessionResponse { valid }))
}

#[post("/sessions/cleanup")]
pub async fn cleanup_sessions(store: web::Data<Addr<SessionKeyStore>>) -> Result<HttpResponse, ApiError> {
    let removed = store.send(CleanupExpiredSessions).await?;
    Ok(ok(CleanupResponse { removed }))
}

#[get("/sessions/metrics")]
pub async fn session_metrics(store: web::Data<Addr<SessionKeyStore>>) -> Result<HttpResponse, ApiError> {
    let metrics = store.send(GetSessionMetrics).await?;
    Ok(ok(metrics))
}

// Session details without the key
#[get("/sessions/{address}")]
pub async fn get_session(
    path: web::Path<(String,)>,
    store: web::Data<Addr<SessionKeyStore>>,
) -> Result<HttpResponse, ApiError> {
    let address = Address::parse(&path.0)?;

    match store.send(GetActiveSession { address }).await? {
        Some(session) => Ok(ok(WalletSessionResponse::from(&session))),
        None => Ok(HttpResponse::NotFound().json(common::ApiResponse::<()>::failure("No active session"))),
    }
}

// Disconnect requires the caller's own session key
#[delete("/sessions/{address}")]
pub async fn disconnect(
    path: web::Path<(String,)>,
    req: HttpRequest,
    store: web::Data<Addr<SessionKeyStore>>,
) -> Result<HttpResponse, ApiError> {
    let address = Address::parse(&path.0)?;
    let caller = authenticate(&req, &store).await?;

    if caller != address {
        tracing::warn!("{} attempted to disconnect {}", caller, address);
        return Err(ApiError::Unauthorized("session key does not belong to this address".to_string()));
    }

    let removed = store.send(Disconnect { address }).await?;
    Ok(ok(json!({ "disconnected": removed })))
}

// Explicit demo mode: connect the configured demo wallet without a real wallet
#[post("/demo/connect")]
pub async fn demo_connect(
    config: web::Data<Config>,
    store: web::Data<Addr<SessionKeyStore>>,
) -> Result<HttpResponse, ApiError> {
    if !config.demo.enabled {
        return Err(ApiError::Unavailable("demo mode"));
    }

    let address = Address::parse(&config.demo.address)?;
    tracing::warn!("Demo connect issued a session for {}", address);

    let issued = store.send(CreateSession { address }).await?;
    Ok(ok(issued))
}
