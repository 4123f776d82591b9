// web-server/src/error.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::{AddressError, ApiResponse, ChannelError, GameError, NetworkError};
use thiserror::Error;

use crate::game_registry::PlayError;

/// Failure of an API call, rendered as `{"success": false, "error": ...}`
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0} is not available")]
    Unavailable(&'static str),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("session store unavailable: {0}")]
    Mailbox(#[from] actix::MailboxError),
}

impl From<PlayError> for ApiError {
    fn from(err: PlayError) -> Self {
        match err {
            PlayError::Game(e) => ApiError::Game(e),
            PlayError::Channel(e) => ApiError::Channel(e),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Address(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Unavailable(_) | ApiError::Mailbox(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Network(_) => StatusCode::BAD_GATEWAY,
            ApiError::Channel(e) => match e {
                ChannelError::NotFound(_) => StatusCode::NOT_FOUND,
                ChannelError::NotParticipant(_) => StatusCode::FORBIDDEN,
                ChannelError::InvalidVersion { .. } | ChannelError::StaleFinalState { .. } => StatusCode::CONFLICT,
                ChannelError::Network(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::BAD_REQUEST,
            },
            ApiError::Game(e) => match e {
                GameError::NotFound(_) => StatusCode::NOT_FOUND,
                GameError::NotPlayer(_) => StatusCode::FORBIDDEN,
                GameError::NotYourTurn { .. } | GameError::CellOccupied { .. } | GameError::CellEmpty { .. } => {
                    StatusCode::CONFLICT
                }
                GameError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        HttpResponse::build(status).json(ApiResponse::<()>::failure(self.to_string()))
    }
}
