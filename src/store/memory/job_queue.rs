use {
    crate::domain::{
        error::PipelineError,
        job::{Job, NackOutcome, NewJob, RetryPolicy},
    },
    crate::store::JobQueue,
    async_trait::async_trait,
    chrono::{DateTime, Duration as ChronoDuration, Utc},
    std::collections::HashMap,
    std::time::Duration,
    tokio::sync::Mutex,
    uuid::Uuid,
};

/// A job that exhausted its attempts, kept for manual inspection.
#[derive(Debug, Clone)]
pub struct DeadJob {
    pub job: Job,
    pub reason: String,
    pub buried_at: DateTime<Utc>,
}

struct Leased {
    job: Job,
    lease_expires: DateTime<Utc>,
}

#[derive(Default)]
struct QueueData {
    ready: Vec<Job>,
    leased: HashMap<Uuid, Leased>,
    dead: Vec<DeadJob>,
}

/// In-memory at-least-once queue. Leases are tracked as timestamps; an
/// expired lease moves the job back to the ready set on the next dequeue,
/// which is exactly the crash-recovery path: no ack, no nack, the job just
/// reappears.
pub struct MemoryJobQueue {
    data: Mutex<QueueData>,
    policy: RetryPolicy,
}

impl MemoryJobQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            data: Mutex::new(QueueData::default()),
            policy,
        }
    }

    /// Jobs that exhausted retries. Inspection hook for tests and ops.
    pub async fn dead_letters(&self) -> Vec<DeadJob> {
        self.data.lock().await.dead.clone()
    }

    pub async fn ready_len(&self) -> usize {
        let mut data = self.data.lock().await;
        Self::reclaim_expired(&mut data, Utc::now());
        data.ready.len()
    }

    /// Peek at a queued job's scheduling metadata without leasing it.
    pub async fn peek(&self, job_id: Uuid) -> Option<Job> {
        let data = self.data.lock().await;
        data.ready.iter().find(|j| j.id == job_id).cloned()
    }

    fn reclaim_expired(data: &mut QueueData, now: DateTime<Utc>) {
        let expired: Vec<Uuid> = data
            .leased
            .iter()
            .filter(|(_, l)| l.lease_expires <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(leased) = data.leased.remove(&id) {
                tracing::debug!(job_id = %id, "lease expired, job visible again");
                data.ready.push(leased.job);
            }
        }
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: NewJob, delay: Option<Duration>) -> Result<Uuid, PipelineError> {
        let now = Utc::now();
        let available_at = match delay {
            Some(d) => now + ChronoDuration::from_std(d).unwrap_or_default(),
            None => now,
        };
        let id = Uuid::now_v7();
        let job = Job {
            id,
            payload: job.payload,
            attempt: 0,
            max_attempts: job.max_attempts,
            idempotency_key: job.idempotency_key,
            correlation_id: job.correlation_id,
            available_at,
            enqueued_at: now,
        };
        self.data.lock().await.ready.push(job);
        Ok(id)
    }

    async fn dequeue(&self, lease: Duration) -> Result<Option<Job>, PipelineError> {
        let now = Utc::now();
        let mut data = self.data.lock().await;
        Self::reclaim_expired(&mut data, now);

        // Oldest available first; ordering is best-effort, not a guarantee.
        let pos = data
            .ready
            .iter()
            .enumerate()
            .filter(|(_, j)| j.available_at <= now)
            .min_by_key(|(_, j)| j.available_at)
            .map(|(i, _)| i);

        let Some(pos) = pos else {
            return Ok(None);
        };

        let job = data.ready.swap_remove(pos);
        let lease_expires = now + ChronoDuration::from_std(lease).unwrap_or_default();
        data.leased.insert(
            job.id,
            Leased {
                job: job.clone(),
                lease_expires,
            },
        );
        Ok(Some(job))
    }

    async fn ack(&self, job_id: Uuid) -> Result<(), PipelineError> {
        let mut data = self.data.lock().await;
        // A lease that lapsed before the ack has already forfeited the job;
        // reclaiming first makes the late ack a no-op instead of a delete.
        Self::reclaim_expired(&mut data, Utc::now());
        data.leased.remove(&job_id);
        Ok(())
    }

    async fn nack(
        &self,
        job_id: Uuid,
        reason: &str,
        delay: Option<Duration>,
    ) -> Result<NackOutcome, PipelineError> {
        let now = Utc::now();
        let mut data = self.data.lock().await;
        Self::reclaim_expired(&mut data, now);
        let Some(leased) = data.leased.remove(&job_id) else {
            // Lease already expired; the job is (or will be) redelivered.
            return Ok(NackOutcome::Retried { available_at: now });
        };

        let mut job = leased.job;
        job.attempt += 1;

        if job.attempt >= job.max_attempts {
            tracing::warn!(job_id = %job.id, attempts = job.attempt, reason, "job dead-lettered");
            data.dead.push(DeadJob {
                job,
                reason: reason.to_string(),
                buried_at: now,
            });
            return Ok(NackOutcome::DeadLettered);
        }

        let backoff = delay.unwrap_or_else(|| self.policy.delay_for(job.attempt));
        job.available_at = now + ChronoDuration::from_std(backoff).unwrap_or_default();
        let available_at = job.available_at;
        data.ready.push(job);
        Ok(NackOutcome::Retried { available_at })
    }

    async fn bury(&self, job_id: Uuid, reason: &str) -> Result<(), PipelineError> {
        let now = Utc::now();
        let mut data = self.data.lock().await;
        Self::reclaim_expired(&mut data, now);
        if let Some(leased) = data.leased.remove(&job_id) {
            data.dead.push(DeadJob {
                job: leased.job,
                reason: reason.to_string(),
                buried_at: now,
            });
        }
        Ok(())
    }
}
