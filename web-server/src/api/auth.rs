// web-server/src/api/auth.rs
use actix::Addr;
use actix_web::HttpRequest;
use common::Address;

use crate::error::ApiError;
use crate::session_store::{SessionKeyStore, ValidateSessionKey};

pub const WALLET_ADDRESS_HEADER: &str = "x-wallet-address";
pub const SESSION_KEY_HEADER: &str = "x-session-key";

fn header<'a>(req: &'a HttpRequest, name: &str) -> Result<&'a str, ApiError> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", name)))
}

/// Resolve the caller from the session headers, rejecting unknown or expired keys
pub async fn authenticate(req: &HttpRequest, store: &Addr<SessionKeyStore>) -> Result<Address, ApiError> {
    let address = Address::parse(header(req, WALLET_ADDRESS_HEADER)?)?;
    let session_key = header(req, SESSION_KEY_HEADER)?.to_string();

    let valid = store
        .send(ValidateSessionKey { address: address.clone(), session_key })
        .await?;

    if !valid {
        tracing::warn!("Rejected session key for {}", address);
        return Err(ApiError::Unauthorized("invalid or expired session key".to_string()));
    }

    Ok(address)
}
