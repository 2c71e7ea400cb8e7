use {
    super::id::{EventId, PaymentId, ProfileId},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::time::Duration,
    uuid::Uuid,
};

/// Payload for the job that drives a profile transition off a payment event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub event_id: EventId,
    pub event_type: String,
    pub payment_id: PaymentId,
}

/// Follow-up notification enqueued after a terminal transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub profile_id: ProfileId,
    pub payment_id: PaymentId,
    pub kind: NotificationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Activated,
    ActivationFailed,
}

/// Closed set of job kinds. The processor matches exhaustively; adding a
/// kind forces every dispatch site to handle it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "job_kind", rename_all = "snake_case")]
pub enum JobPayload {
    Processing(ProcessingJob),
    Notification(NotificationJob),
}

/// What a producer hands to the queue. The payload travels as serialized
/// bytes; consumers deserialize into [`JobPayload`] and dead-letter
/// anything that does not parse.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub payload: Vec<u8>,
    pub idempotency_key: String,
    pub correlation_id: String,
    pub max_attempts: u32,
}

/// A leased unit of queued work. Scheduling metadata (`attempt`,
/// `available_at`) is owned by the queue and only changes through
/// ack/nack.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub payload: Vec<u8>,
    pub attempt: u32,
    pub max_attempts: u32,
    pub idempotency_key: String,
    pub correlation_id: String,
    pub available_at: DateTime<Utc>,
    pub enqueued_at: DateTime<Utc>,
}

/// Outcome of a nack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NackOutcome {
    /// Rescheduled; visible again at the given time.
    Retried { available_at: DateTime<Utc> },
    /// Attempts exhausted; moved to the dead-letter set.
    DeadLettered,
}

/// Idempotency keys derive from the semantic operation, never from the
/// transport event id — the same logical confirmation can arrive under
/// several event envelopes, and those must all collapse to one key.
pub fn activation_key(profile: &ProfileId) -> String {
    format!("activate:{}", profile.as_str())
}

pub fn failure_key(profile: &ProfileId) -> String {
    format!("fail:{}", profile.as_str())
}

pub fn notification_key(profile: &ProfileId, kind: NotificationKind) -> String {
    let k = match kind {
        NotificationKind::Activated => "activated",
        NotificationKind::ActivationFailed => "activation_failed",
    };
    format!("notify:{k}:{}", profile.as_str())
}

/// Exponential backoff with a cap and deterministic ±25% jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay before attempt `attempt` (1-based: the first retry passes 1).
    /// Strictly increasing until the cap, then flat at the cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exp = attempt.min(20); // past here the shift saturates anyway
        let raw = base.saturating_mul(1u64 << exp);

        // Deterministic jitter keyed on the attempt number: retries of a
        // herd of jobs created together still spread out, and tests stay
        // reproducible.
        let jittered = if raw >= self.max_delay.as_millis() as u64 {
            raw
        } else {
            let seed = attempt.wrapping_mul(2654435761) as u64;
            let factor = 750 + (seed % 500); // 0.75x … 1.25x
            raw.saturating_mul(factor) / 1000
        };

        Duration::from_millis(jittered).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}
