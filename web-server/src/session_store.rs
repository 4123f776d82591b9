// web-server/src/session_store.rs
use actix::{Actor, Context, Handler, Message, AsyncContext, MessageResult};
use chrono::Duration as ChronoDuration;
use common::models::session::{IssuedSession, WalletSession};
use common::{Address, Clock, SessionConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::{AuditKind, AuditRecord, AuditSink};
use crate::utils::token::{constant_time_eq, create_session_key};

// Default session lifetime in seconds (1 hour)
const DEFAULT_SESSION_TIMEOUT: i64 = 3600;
const DEFAULT_MAX_SESSIONS: usize = 100;

/// Actor message: Issue a session key for an address, reusing a live one
#[derive(Message)]
#[rtype(result = "IssuedSession")]
pub struct CreateSession {
    pub address: Address,
}

/// Actor message: Look up the active session of an address
#[derive(Message)]
#[rtype(result = "Option<WalletSession>")]
pub struct GetActiveSession {
    pub address: Address,
}

/// Actor message: Check a presented session key
#[derive(Message)]
#[rtype(result = "bool")]
pub struct ValidateSessionKey {
    pub address: Address,
    pub session_key: String,
}

/// Actor message: Drop the session of an address
#[derive(Message)]
#[rtype(result = "bool")]
pub struct Disconnect {
    pub address: Address,
}

/// Actor message: Clean up expired sessions
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupExpiredSessions;

/// Actor message: Get session metrics
#[derive(Message)]
#[rtype(result = "SessionMetrics")]
pub struct GetSessionMetrics;

/// Session metrics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SessionMetrics {
    pub total_sessions: usize,
    pub expired_count: usize,
    pub evicted_count: usize,
    pub avg_session_age_seconds: f64,
}

/// Store of per-wallet session keys.
///
/// Holds at most one session per address and at most `max_sessions` overall;
/// when full, the session created earliest is evicted. Expired sessions are
/// purged when looked up and by the periodic sweep.
pub struct SessionKeyStore {
    sessions: HashMap<Address, WalletSession>,
    session_timeout: ChronoDuration,
    max_sessions: usize,
    // Cleanup interval in seconds, 0 disables the sweep
    cleanup_interval: u64,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    metrics: SessionMetrics,
}

impl SessionKeyStore {
    pub fn new(clock: Arc<dyn Clock>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            sessions: HashMap::new(),
            session_timeout: ChronoDuration::seconds(DEFAULT_SESSION_TIMEOUT),
            max_sessions: DEFAULT_MAX_SESSIONS,
            cleanup_interval: 0,
            clock,
            audit,
            metrics: SessionMetrics::default(),
        }
    }

    pub fn from_config(config: &SessionConfig, clock: Arc<dyn Clock>, audit: Arc<dyn AuditSink>) -> Self {
        Self::new(clock, audit)
            .with_timeout(config.timeout_secs)
            .with_max_sessions(config.max_sessions)
            .with_cleanup_interval(config.cleanup_interval_secs)
    }

    pub fn with_timeout(mut self, timeout_seconds: i64) -> Self {
        self.session_timeout = ChronoDuration::seconds(timeout_seconds);
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn with_cleanup_interval(mut self, interval_seconds: u64) -> Self {
        self.cleanup_interval = interval_seconds;
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Return the live session key of `address`, or issue a new one
    pub fn create_session(&mut self, address: Address) -> IssuedSession {
        if let Some(session) = self.get_active_session(&address) {
            tracing::debug!("Reusing session for {}", address);
            return IssuedSession::from_session(&session, false);
        }

        if self.sessions.len() >= self.max_sessions {
            self.evict_oldest();
        }

        let now = self.clock.now();
        let session = WalletSession::new(address.clone(), create_session_key(), now, self.session_timeout);
        let issued = IssuedSession::from_session(&session, true);
        self.sessions.insert(address.clone(), session);

        tracing::info!("Issued session key for {}", address);
        self.audit.record(AuditRecord::new(
            AuditKind::SessionCreated,
            address.as_str(),
            format!("expires at {}", issued.expires_at),
            now,
        ));

        issued
    }

    /// The session of `address` if present and unexpired. An expired session
    /// is removed on the way out.
    pub fn get_active_session(&mut self, address: &Address) -> Option<WalletSession> {
        let now = self.clock.now();
        let usable = self.sessions.get(address)?.is_usable(now);

        if usable {
            return self.sessions.get(address).cloned();
        }

        if let Some(mut expired) = self.sessions.remove(address) {
            expired.deactivate();
            self.metrics.expired_count += 1;
            tracing::debug!("Session expired: {}", expired.address);
        }
        None
    }

    pub fn validate_session_key(&mut self, address: &Address, session_key: &str) -> bool {
        self.get_active_session(address)
            .map(|session| constant_time_eq(&session.session_key, session_key))
            .unwrap_or(false)
    }

    /// Remove the session of `address`; returns whether one existed
    pub fn disconnect(&mut self, address: &Address) -> bool {
        match self.sessions.remove(address) {
            Some(_) => {
                tracing::info!("Disconnected session for {}", address);
                self.audit.record(AuditRecord::new(
                    AuditKind::SessionDisconnected,
                    address.as_str(),
                    "session removed",
                    self.clock.now(),
                ));
                true
            }
            None => false,
        }
    }

    /// Remove expired sessions and update metrics
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();

        self.sessions.retain(|_, session| !session.is_expired(now));

        let expired_count = before - self.sessions.len();
        self.metrics.expired_count += expired_count;
        expired_count
    }

    pub fn metrics(&self) -> SessionMetrics {
        let now = self.clock.now();
        let total = self.sessions.len();
        let age_sum: f64 = self
            .sessions
            .values()
            .map(|session| now.signed_duration_since(session.created_at).num_seconds() as f64)
            .sum();

        SessionMetrics {
            total_sessions: total,
            avg_session_age_seconds: if total > 0 { age_sum / total as f64 } else { 0.0 },
            ..self.metrics.clone()
        }
    }

    // Evicts regardless of expiry
    fn evict_oldest(&mut self) {
        let oldest = self
            .sessions
            .values()
            .min_by_key(|session| session.created_at)
            .map(|session| session.address.clone());

        if let Some(address) = oldest {
            self.sessions.remove(&address);
            self.metrics.evicted_count += 1;
            tracing::info!("Session store full, evicted oldest session: {}", address);
        }
    }
}

impl Actor for SessionKeyStore {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            "SessionKeyStore started with timeout {}s, capacity {}",
            self.session_timeout.num_seconds(),
            self.max_sessions
        );

        if self.cleanup_interval > 0 {
            ctx.run_interval(Duration::from_secs(self.cleanup_interval), |act, _ctx| {
                let expired_count = act.cleanup_expired();
                if expired_count > 0 {
                    tracing::info!("Cleaned up {} expired sessions", expired_count);
                }
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "SessionKeyStore stopped. {} live sessions, {} expired and {} evicted during lifetime",
            self.sessions.len(),
            self.metrics.expired_count,
            self.metrics.evicted_count
        );
    }
}

impl Handler<CreateSession> for SessionKeyStore {
    type Result = MessageResult<CreateSession>;

    fn handle(&mut self, msg: CreateSession, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.create_session(msg.address))
    }
}

impl Handler<GetActiveSession> for SessionKeyStore {
    type Result = MessageResult<GetActiveSession>;

    fn handle(&mut self, msg: GetActiveSession, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.get_active_session(&msg.address))
    }
}

impl Handler<ValidateSessionKey> for SessionKeyStore {
    type Result = MessageResult<ValidateSessionKey>;

    fn handle(&mut self, msg: ValidateSessionKey, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.validate_session_key(&msg.address, &msg.session_key))
    }
}

impl Handler<Disconnect> for SessionKeyStore {
    type Result = MessageResult<Disconnect>;

    fn handle(&mut self, msg: Disconnect, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.disconnect(&msg.address))
    }
}

impl Handler<CleanupExpiredSessions> for SessionKeyStore {
    type Result = MessageResult<CleanupExpiredSessions>;

    fn handle(&mut self, _msg: CleanupExpiredSessions, _ctx: &mut Self::Context) -> Self::Result {
        let expired_count = self.cleanup_expired();
        tracing::info!("Cleaned up {} expired sessions", expired_count);
        MessageResult(expired_count)
    }
}

impl Handler<GetSessionMetrics> for SessionKeyStore {
    type Result = MessageResult<GetSessionMetrics>;

    fn handle(&mut self, _msg: GetSessionMetrics, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.metrics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAuditSink;
    use common::ManualClock;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn store(clock: &ManualClock) -> SessionKeyStore {
        SessionKeyStore::new(Arc::new(clock.clone()), Arc::new(TracingAuditSink))
            .with_timeout(60)
            .with_max_sessions(3)
    }

    #[test]
    fn test_create_session_is_idempotent_while_live() {
        let clock = ManualClock::default();
        let mut store = store(&clock);

        let first = store.create_session(addr(1));
        clock.advance(ChronoDuration::seconds(30));
        let second = store.create_session(addr(1));

        assert!(first.new_session);
        assert!(!second.new_session);
        assert_eq!(first.session_key, second.session_key);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_expired_session_is_purged_on_lookup() {
        let clock = ManualClock::default();
        let mut store = store(&clock);
        let issued = store.create_session(addr(0xab));
        assert_eq!(store.len(), 1);

        clock.advance(ChronoDuration::seconds(61));

        assert!(store.get_active_session(&addr(0xab)).is_none());
        assert_eq!(store.len(), 0);
        assert!(!store.validate_session_key(&addr(0xab), &issued.session_key));
        assert_eq!(store.metrics().expired_count, 1);
    }

    #[test]
    fn test_new_key_after_expiry() {
        let clock = ManualClock::default();
        let mut store = store(&clock);
        let first = store.create_session(addr(1));

        clock.advance(ChronoDuration::seconds(120));
        let second = store.create_session(addr(1));

        assert!(second.new_session);
        assert_ne!(first.session_key, second.session_key);
    }

    #[test]
    fn test_capacity_evicts_exactly_the_oldest() {
        let clock = ManualClock::default();
        let mut store = store(&clock);

        for n in 1..=3 {
            store.create_session(addr(n));
            clock.advance(ChronoDuration::seconds(1));
        }
        store.create_session(addr(4));

        assert_eq!(store.len(), 3);
        assert!(store.get_active_session(&addr(1)).is_none());
        for n in 2..=4 {
            assert!(store.get_active_session(&addr(n)).is_some());
        }
        assert_eq!(store.metrics().evicted_count, 1);
    }

    #[test]
    fn test_validate_session_key() {
        let clock = ManualClock::default();
        let mut store = store(&clock);
        let issued = store.create_session(addr(1));

        assert!(store.validate_session_key(&addr(1), &issued.session_key));
        assert!(!store.validate_session_key(&addr(1), "wrong"));
        assert!(!store.validate_session_key(&addr(2), &issued.session_key));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let clock = ManualClock::default();
        let mut store = store(&clock);
        store.create_session(addr(1));

        assert!(store.disconnect(&addr(1)));
        assert!(!store.disconnect(&addr(1)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_cleanup_expired_removes_only_expired() {
        let clock = ManualClock::default();
        let mut store = store(&clock);
        store.create_session(addr(1));
        clock.advance(ChronoDuration::seconds(45));
        store.create_session(addr(2));
        clock.advance(ChronoDuration::seconds(30));

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.cleanup_expired(), 0);
        assert!(store.get_active_session(&addr(2)).is_some());
    }

    #[actix::test]
    async fn test_actor_round_trip() {
        let clock = ManualClock::default();
        let addr_store = store(&clock).start();

        let issued = addr_store.send(CreateSession { address: addr(7) }).await.unwrap();
        let valid = addr_store
            .send(ValidateSessionKey { address: addr(7), session_key: issued.session_key.clone() })
            .await
            .unwrap();
        assert!(valid);

        assert!(addr_store.send(Disconnect { address: addr(7) }).await.unwrap());
        let session = addr_store.send(GetActiveSession { address: addr(7) }).await.unwrap();
        assert!(session.is_none());
    }

    #[actix::test]
    async fn test_interval_sweep_removes_expired_sessions() {
        let clock = ManualClock::default();
        let addr_store = store(&clock).with_cleanup_interval(1).start();

        addr_store.send(CreateSession { address: addr(1) }).await.unwrap();
        clock.advance(ChronoDuration::seconds(30));
        addr_store.send(CreateSession { address: addr(2) }).await.unwrap();
        clock.advance(ChronoDuration::seconds(31));

        // Nothing looks the sessions up; only the sweep can drop the expired one
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let metrics = addr_store.send(GetSessionMetrics).await.unwrap();
        assert_eq!(metrics.total_sessions, 1);
        assert_eq!(metrics.expired_count, 1);
    }
}
