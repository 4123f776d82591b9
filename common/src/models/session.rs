// common/src/models/session.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Short-lived session credential issued to a wallet address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSession {
    /// Wallet that owns the session
    pub address: Address,
    /// Opaque credential presented instead of a signing key
    pub session_key: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl WalletSession {
    /// Create a new active session valid for `timeout` from `now`
    pub fn new(address: Address, session_key: String, now: DateTime<Utc>, timeout: Duration) -> Self {
        Self {
            address,
            session_key,
            is_active: true,
            created_at: now,
            expires_at: now + timeout,
        }
    }

    /// Whether `expires_at` has passed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Active and not yet expired
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

/// Session data returned when a session key is issued or reused
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedSession {
    pub address: Address,
    pub session_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub new_session: bool,
}

impl IssuedSession {
    pub fn from_session(session: &WalletSession, new_session: bool) -> Self {
        Self {
            address: session.address.clone(),
            session_key: session.session_key.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
            new_session,
        }
    }
}

/// Response structure for session lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSessionResponse {
    pub address: Address,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    // Omit the session key
}

impl From<&WalletSession> for WalletSessionResponse {
    fn from(session: &WalletSession) -> Self {
        Self {
            address: session.address.clone(),
            is_active: session.is_active,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

impl From<&IssuedSession> for WalletSessionResponse {
    fn from(issued: &IssuedSession) -> Self {
        Self {
            address: issued.address.clone(),
            is_active: true,
            created_at: issued.created_at,
            expires_at: issued.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let address = Address::parse("0x00000000000000000000000000000000000000a1").unwrap();
        let session = WalletSession::new(address, "key".into(), now, Duration::seconds(60));

        assert!(session.is_usable(now + Duration::seconds(60)));
        assert!(!session.is_usable(now + Duration::seconds(61)));
    }
}
