use {
    crate::domain::error::PipelineError,
    crate::store::{Claim, IdempotencyStore},
    async_trait::async_trait,
    chrono::{DateTime, Duration as ChronoDuration, Utc},
    std::collections::HashMap,
    std::time::Duration,
    tokio::sync::Mutex,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    InProgress,
    Completed(Option<serde_json::Value>),
    Failed,
}

#[derive(Debug, Clone)]
struct Record {
    outcome: Outcome,
    expires_at: DateTime<Utc>,
}

/// In-memory idempotency store. The whole map sits behind one mutex, so a
/// `claim` is a single atomic step: check-and-insert under one guard, with
/// exactly one winner among concurrent claimants of the same key.
#[derive(Default)]
pub struct MemoryIdempotencyStore {
    records: Mutex<HashMap<String, Record>>,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn claim(&self, key: &str, ttl: Duration) -> Result<Claim, PipelineError> {
        let now = Utc::now();
        let mut records = self.records.lock().await;

        match records.get(key) {
            Some(rec) if rec.expires_at > now => match &rec.outcome {
                Outcome::InProgress => return Ok(Claim::AlreadyInProgress),
                Outcome::Completed(result) => {
                    return Ok(Claim::AlreadyCompleted(result.clone()));
                }
                // A failed attempt releases the key; fall through to claim.
                Outcome::Failed => {}
            },
            // Expired or absent; fall through to claim.
            _ => {}
        }

        records.insert(
            key.to_string(),
            Record {
                outcome: Outcome::InProgress,
                expires_at: now + ChronoDuration::from_std(ttl).unwrap_or_default(),
            },
        );
        Ok(Claim::Acquired)
    }

    async fn complete(
        &self,
        key: &str,
        result: Option<serde_json::Value>,
        ttl: Duration,
    ) -> Result<(), PipelineError> {
        let mut records = self.records.lock().await;
        match records.get_mut(key) {
            Some(rec) => {
                rec.outcome = Outcome::Completed(result);
                // The completed record outlives the short claim window; it
                // is what catches duplicates delivered days later.
                rec.expires_at = Utc::now() + ChronoDuration::from_std(ttl).unwrap_or_default();
                Ok(())
            }
            None => Err(PipelineError::Store(format!(
                "complete on unclaimed idempotency key: {key}"
            ))),
        }
    }

    async fn fail(&self, key: &str) -> Result<(), PipelineError> {
        let mut records = self.records.lock().await;
        if let Some(rec) = records.get_mut(key) {
            rec.outcome = Outcome::Failed;
        }
        Ok(())
    }
}
