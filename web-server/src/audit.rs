// web-server/src/audit.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    SessionCreated,
    SessionDisconnected,
    ChannelCreated,
    ChannelUpdated,
    ChannelClosed,
    ChannelChallenged,
    GameMove,
    GameEnded,
}

/// Bookkeeping record emitted after an operation succeeds
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub kind: AuditKind,
    /// Wallet address, channel id or game id the record is about
    pub subject: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(kind: AuditKind, subject: impl Into<String>, detail: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            detail: detail.into(),
            at,
        }
    }
}

/// Destination for audit records. Implementations must not fail the caller.
pub trait AuditSink: Send + Sync + Debug {
    fn record(&self, record: AuditRecord);
}

/// Emits audit records as structured events on the `audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        tracing::info!(
            target: "audit",
            kind = ?record.kind,
            subject = %record.subject,
            at = %record.at,
            "{}",
            record.detail
        );
    }
}
