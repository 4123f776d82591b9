// web-server/src/api/mod.rs
pub mod auth;
pub mod channels;
pub mod faucet;
pub mod games;
pub mod sessions;

use actix_web::web;
use common::ApiResponse;

use crate::error::ApiError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .service(sessions::api_index)
            .service(sessions::create_session)
            .service(sessions::validate_session)
            .service(sessions::cleanup_sessions)
            .service(sessions::session_metrics)
            .service(sessions::get_session)
            .service(sessions::disconnect)
            .service(sessions::demo_connect)
            .service(channels::create_channel)
            .service(channels::list_channels)
            .service(channels::get_channel)
            .service(channels::get_remote_channel)
            .service(channels::update_channel_state)
            .service(channels::close_channel)
            .service(channels::challenge_channel)
            .service(games::create_game)
            .service(games::get_game)
            .service(games::play_move)
            .service(games::end_game)
            .service(faucet::request_funds)
    );
}

/// 200 with the success envelope
pub(crate) fn ok<T: serde::Serialize>(data: T) -> actix_web::HttpResponse {
    actix_web::HttpResponse::Ok().json(ApiResponse::ok(data))
}
