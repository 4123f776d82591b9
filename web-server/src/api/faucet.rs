// web-server/src/api/faucet.rs
use actix_web::{post, web, HttpResponse};
use common::FaucetRequest;

use super::ok;
use crate::error::ApiError;
use crate::faucet::FaucetClient;

#[post("/faucet")]
pub async fn request_funds(
    body: web::Json<FaucetRequest>,
    faucet: Option<web::Data<FaucetClient>>,
) -> Result<HttpResponse, ApiError> {
    let faucet = faucet.ok_or(ApiError::Unavailable("faucet"))?;
    let receipt = faucet.request(body.into_inner()).await?;
    Ok(ok(receipt))
}
