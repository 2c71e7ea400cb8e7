//! Collaborator seams. Every external dependency of the pipeline — entity
//! storage, the job queue, the idempotency cache, the audit trail, the
//! notification sink and the read-through cache — is a trait injected into
//! the components that need it. No ambient state: parallel test instances
//! each get their own set.

pub mod memory;

use {
    crate::domain::{
        audit::NewAuditEntry,
        error::PipelineError,
        id::ProfileId,
        job::{Job, NackOutcome, NewJob, NotificationJob},
        profile::PayableProfile,
    },
    async_trait::async_trait,
    std::time::Duration,
    uuid::Uuid,
};

/// Persisted state of payable profiles, with compare-and-swap updates.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, id: &ProfileId) -> Result<Option<PayableProfile>, PipelineError>;

    async fn insert(&self, profile: PayableProfile) -> Result<(), PipelineError>;

    /// Write `profile` only if the stored version equals `expected_version`.
    /// On mismatch returns [`PipelineError::Conflict`] and changes nothing;
    /// the caller re-reads and decides.
    async fn update(
        &self,
        profile: PayableProfile,
        expected_version: u64,
    ) -> Result<PayableProfile, PipelineError>;
}

/// Durable at-least-once queue. A dequeued job is invisible to other
/// consumers until its lease expires or it is acked/nacked; a worker that
/// dies mid-job simply lets the lease lapse and the job reappears — which
/// is why every consumer must be idempotent.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: NewJob, delay: Option<Duration>) -> Result<Uuid, PipelineError>;

    async fn dequeue(&self, lease: Duration) -> Result<Option<Job>, PipelineError>;

    /// Permanently remove a completed job. Acking an unknown or
    /// lease-expired job is a no-op.
    async fn ack(&self, job_id: Uuid) -> Result<(), PipelineError>;

    /// Record a failed attempt. Reschedules with exponential backoff, or
    /// dead-letters once attempts are exhausted. `delay` overrides the
    /// backoff (used for the short "someone else is on it" retry).
    async fn nack(
        &self,
        job_id: Uuid,
        reason: &str,
        delay: Option<Duration>,
    ) -> Result<NackOutcome, PipelineError>;

    /// Move a job straight to the dead-letter set, bypassing retries.
    /// For payloads where retrying cannot help (e.g. undeserializable).
    async fn bury(&self, job_id: Uuid, reason: &str) -> Result<(), PipelineError>;
}

/// Result of an idempotency claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// This caller owns the operation; it must `complete` or `fail` it.
    Acquired,
    /// Another worker holds an unexpired claim.
    AlreadyInProgress,
    /// The operation already ran to completion.
    AlreadyCompleted(Option<serde_json::Value>),
}

/// Key → outcome cache that guarantees a logical operation fully executes
/// at most once. `claim` must be a single atomic step against the backing
/// store — never a read followed by a write.
///
/// The claim `ttl` bounds the in-flight window only: a claimant that dies
/// without resolving leaves a record that expires and is reclaimable by
/// the redelivered job. `complete` sets its own, much longer expiry, the
/// window during which duplicates are recognized.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn claim(&self, key: &str, ttl: Duration) -> Result<Claim, PipelineError>;

    async fn complete(
        &self,
        key: &str,
        result: Option<serde_json::Value>,
        ttl: Duration,
    ) -> Result<(), PipelineError>;

    /// Release a claim after a failed attempt so a retry can re-acquire.
    async fn fail(&self, key: &str) -> Result<(), PipelineError>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: NewAuditEntry) -> Result<(), PipelineError>;
}

/// Downstream notification transport. Templating and delivery internals
/// live behind this boundary.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: &NotificationJob) -> Result<(), PipelineError>;
}

/// Optional read-through cache. Never a correctness dependency: callers
/// treat every error as a miss.
#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, PipelineError>;

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), PipelineError>;
}
