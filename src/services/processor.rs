use {
    crate::{
        AppState,
        domain::{
            audit::NewAuditEntry,
            error::PipelineError,
            gateway::{GatewayPayment, GatewayPaymentStatus},
            id::{PaymentId, ProfileId},
            job::{
                self, Job, JobPayload, NotificationJob, NotificationKind, ProcessingJob,
            },
            profile::{PayableProfile, ProfileStatus},
        },
        store::Claim,
    },
    chrono::Utc,
    uuid::Uuid,
};

const ACTOR: &str = "worker";

/// What processing one dequeued job amounted to. Every variant corresponds
/// to a queue decision (ack, nack or bury) that has already been made by
/// the time the caller sees it.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Profile reached `Active`; notification enqueued.
    Activated(ProfileId),
    /// Profile reached `Failed` (payment rejected); notification enqueued.
    MarkedFailed(ProfileId),
    /// Duplicate delivery of an operation that already finished.
    AlreadyDone(ProfileId),
    /// Payment has not settled yet; acked, a later webhook advances it.
    AwaitingPayment(PaymentId),
    /// Another worker holds the claim; rescheduled with a short delay.
    Contention,
    /// Transient failure; rescheduled with backoff (or dead-lettered if
    /// attempts ran out).
    Retrying,
    /// Notification delivered.
    Notified(ProfileId),
    /// Permanent failure; removed from the queue and audited.
    Discarded(String),
}

/// Entry point per dequeued job. Dispatches on the closed payload union;
/// a payload that does not deserialize goes straight to the dead-letter
/// set — retrying malformed bytes cannot help.
pub async fn process_job(state: &AppState, job: &Job) -> Result<ProcessOutcome, PipelineError> {
    let payload: JobPayload = match serde_json::from_slice(&job.payload) {
        Ok(p) => p,
        Err(e) => {
            let reason = format!("undeserializable payload: {e}");
            state.queue.bury(job.id, &reason).await?;
            audit_discard(state, job, None, None, &reason).await?;
            return Ok(ProcessOutcome::Discarded(reason));
        }
    };

    match payload {
        JobPayload::Processing(p) => process_payment_job(state, job, p).await,
        JobPayload::Notification(n) => process_notification_job(state, job, n).await,
    }
}

#[tracing::instrument(
    skip_all,
    fields(job_id = %job.id, payment_id = %p.payment_id, correlation_id = %job.correlation_id)
)]
async fn process_payment_job(
    state: &AppState,
    job: &Job,
    p: ProcessingJob,
) -> Result<ProcessOutcome, PipelineError> {
    // Webhook envelopes carry no payment state; fetch the current truth.
    let payment = match state.gateway.fetch_payment(&p.payment_id).await {
        Ok(pm) => pm,
        Err(e) if e.is_transient() => {
            tracing::warn!(error = %e, "gateway unavailable, scheduling retry");
            state.queue.nack(job.id, &e.to_string(), None).await?;
            return Ok(ProcessOutcome::Retrying);
        }
        Err(e) => {
            return discard(state, job, None, Some(&p.payment_id), &e.to_string()).await;
        }
    };

    let Some(profile_id) = payment.profile_id.clone() else {
        return discard(
            state,
            job,
            None,
            Some(&p.payment_id),
            "payment carries no profile reference",
        )
        .await;
    };

    if payment.status == GatewayPaymentStatus::InProcess {
        state.queue.ack(job.id).await?;
        tracing::info!("payment still settling, nothing to do");
        return Ok(ProcessOutcome::AwaitingPayment(p.payment_id));
    }

    let approved = payment.status == GatewayPaymentStatus::Approved;

    // The idempotency key names the semantic operation on the profile.
    // Redeliveries under fresh event ids collapse onto this same key.
    let key = if approved {
        job::activation_key(&profile_id)
    } else {
        job::failure_key(&profile_id)
    };

    // The claim TTL spans one processing lease: if this worker dies (or its
    // attempt is timed out and dropped) before resolving the claim, the
    // record has expired by the time the lease redelivers the job, and the
    // next attempt reclaims instead of spinning on AlreadyInProgress.
    match state
        .idempotency
        .claim(&key, state.config.lease_duration)
        .await?
    {
        Claim::AlreadyCompleted(_) => {
            state.queue.ack(job.id).await?;
            tracing::info!(profile_id = %profile_id, "duplicate delivery, operation already complete");
            return Ok(ProcessOutcome::AlreadyDone(profile_id));
        }
        Claim::AlreadyInProgress => {
            state
                .queue
                .nack(job.id, "claim held elsewhere", Some(state.config.contention_delay))
                .await?;
            return Ok(ProcessOutcome::Contention);
        }
        Claim::Acquired => {}
    }

    let profile = match read_profile(state, &profile_id).await? {
        Some(pr) => pr,
        None => {
            state.idempotency.fail(&key).await?;
            return discard(
                state,
                job,
                Some(&profile_id),
                Some(&p.payment_id),
                "profile not found",
            )
            .await;
        }
    };

    // The entity may have moved on while the idempotency record expired or
    // was wiped; the entity's own state is the final word.
    if profile.status().is_terminal() {
        state
            .idempotency
            .complete(
                &key,
                Some(serde_json::json!({"status": profile.status().as_str()})),
                state.config.idempotency_ttl,
            )
            .await?;
        state.queue.ack(job.id).await?;
        return Ok(ProcessOutcome::AlreadyDone(profile_id));
    }

    match run_transitions(state, profile, &payment, approved).await {
        Ok(finished) => {
            state
                .idempotency
                .complete(
                    &key,
                    Some(serde_json::json!({"status": finished.status().as_str()})),
                    state.config.idempotency_ttl,
                )
                .await?;

            refresh_cache(state, &finished).await;
            enqueue_notification(state, job, &finished, approved).await?;
            audit_transition(state, job, &p, &finished).await?;
            state.queue.ack(job.id).await?;

            if approved {
                tracing::info!(profile_id = %profile_id, "profile activated");
                Ok(ProcessOutcome::Activated(profile_id))
            } else {
                tracing::info!(profile_id = %profile_id, "profile marked failed");
                Ok(ProcessOutcome::MarkedFailed(profile_id))
            }
        }
        Err(e) if e.is_transient() || matches!(e, PipelineError::Conflict { .. }) => {
            // Benign race or flaky store: release the claim so the retry
            // can re-acquire, and let backoff spread the next attempt.
            state.idempotency.fail(&key).await?;
            state.queue.nack(job.id, &e.to_string(), None).await?;
            tracing::warn!(error = %e, "transient failure, scheduling retry");
            Ok(ProcessOutcome::Retrying)
        }
        Err(e) => {
            state.idempotency.fail(&key).await?;
            discard(
                state,
                job,
                Some(&profile_id),
                Some(&p.payment_id),
                &e.to_string(),
            )
            .await
        }
    }
}

/// Drive `Pending → Activating → {Active | Failed}` through version-checked
/// writes. A profile already in `Activating` resumes from there — that is
/// the crash-recovery path, safe because binding and QR derivation are
/// idempotent.
async fn run_transitions(
    state: &AppState,
    profile: PayableProfile,
    payment: &GatewayPayment,
    approved: bool,
) -> Result<PayableProfile, PipelineError> {
    let now = Utc::now();

    let activating = match profile.status() {
        ProfileStatus::Pending => {
            let next = profile.begin_activation(payment.payment_id.clone(), now)?;
            state.profiles.update(next, profile.version()).await?
        }
        ProfileStatus::Activating => profile,
        other => {
            return Err(PipelineError::Validation(format!(
                "unexpected profile status {other} during transition"
            )));
        }
    };

    let finished = if approved {
        activating.activate(now)?
    } else {
        activating.fail("payment rejected by processor", now)?
    };
    state.profiles.update(finished, activating.version()).await
}

async fn process_notification_job(
    state: &AppState,
    job: &Job,
    n: NotificationJob,
) -> Result<ProcessOutcome, PipelineError> {
    match state.notifier.send(&n).await {
        Ok(()) => {
            state.queue.ack(job.id).await?;
            tracing::info!(profile_id = %n.profile_id, kind = ?n.kind, "notification delivered");
            Ok(ProcessOutcome::Notified(n.profile_id))
        }
        Err(e) => {
            state.queue.nack(job.id, &e.to_string(), None).await?;
            tracing::warn!(profile_id = %n.profile_id, error = %e, "notification failed, scheduling retry");
            Ok(ProcessOutcome::Retrying)
        }
    }
}

/// Read a profile through the cache. Cache failures are logged and fall
/// back to the store; a stale cached value is harmless because every write
/// is version-checked.
pub async fn read_profile(
    state: &AppState,
    id: &ProfileId,
) -> Result<Option<PayableProfile>, PipelineError> {
    let key = format!("profile:{id}");

    match state.cache.get(&key).await {
        Ok(Some(value)) => {
            if let Ok(profile) = serde_json::from_value::<PayableProfile>(value) {
                return Ok(Some(profile));
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "cache read failed, using store"),
    }

    let profile = state.profiles.get(id).await?;
    if let Some(p) = &profile {
        refresh_cache(state, p).await;
    }
    Ok(profile)
}

async fn refresh_cache(state: &AppState, profile: &PayableProfile) {
    let key = format!("profile:{}", profile.id());
    match serde_json::to_value(profile) {
        Ok(value) => {
            if let Err(e) = state.cache.set(&key, value, state.config.cache_ttl).await {
                tracing::warn!(error = %e, "cache write failed");
            }
        }
        Err(e) => tracing::warn!(error = %e, "profile not cacheable"),
    }
}

async fn enqueue_notification(
    state: &AppState,
    job: &Job,
    profile: &PayableProfile,
    approved: bool,
) -> Result<(), PipelineError> {
    let kind = if approved {
        NotificationKind::Activated
    } else {
        NotificationKind::ActivationFailed
    };
    let payment_id = profile.payment_id().cloned().ok_or_else(|| {
        PipelineError::Validation(format!("profile {} finished without payment", profile.id()))
    })?;

    let payload = serde_json::to_vec(&JobPayload::Notification(NotificationJob {
        profile_id: profile.id().clone(),
        payment_id,
        kind,
    }))?;

    state
        .queue
        .enqueue(
            crate::domain::job::NewJob {
                payload,
                idempotency_key: job::notification_key(profile.id(), kind),
                correlation_id: job.correlation_id.clone(),
                max_attempts: state.config.job_max_attempts,
            },
            None,
        )
        .await?;
    Ok(())
}

async fn audit_transition(
    state: &AppState,
    job: &Job,
    trigger: &ProcessingJob,
    profile: &PayableProfile,
) -> Result<(), PipelineError> {
    state
        .audit
        .append(NewAuditEntry {
            id: Uuid::now_v7(),
            entity_type: "profile".to_string(),
            profile_id: Some(profile.id().to_string()),
            event_id: Some(trigger.event_id.to_string()),
            action: "status_changed".to_string(),
            actor: ACTOR.to_string(),
            correlation_id: Some(job.correlation_id.clone()),
            detail: serde_json::json!({
                "status": profile.status().as_str(),
                "event_type": trigger.event_type,
                "payment_id": profile.payment_id().map(|p| p.as_str()),
                "version": profile.version(),
            }),
            recorded_at: Utc::now(),
        })
        .await
}

/// Permanent failure: remove from the queue but leave a trace — silent
/// drops are how data bugs hide.
async fn discard(
    state: &AppState,
    job: &Job,
    profile_id: Option<&ProfileId>,
    payment_id: Option<&PaymentId>,
    reason: &str,
) -> Result<ProcessOutcome, PipelineError> {
    state.queue.ack(job.id).await?;
    audit_discard(state, job, profile_id, payment_id, reason).await?;
    tracing::warn!(reason, "job discarded as permanent failure");
    Ok(ProcessOutcome::Discarded(reason.to_string()))
}

async fn audit_discard(
    state: &AppState,
    job: &Job,
    profile_id: Option<&ProfileId>,
    payment_id: Option<&PaymentId>,
    reason: &str,
) -> Result<(), PipelineError> {
    state
        .audit
        .append(NewAuditEntry {
            id: Uuid::now_v7(),
            entity_type: "job".to_string(),
            profile_id: profile_id.map(|p| p.to_string()),
            event_id: None,
            action: "job_discarded".to_string(),
            actor: ACTOR.to_string(),
            correlation_id: Some(job.correlation_id.clone()),
            detail: serde_json::json!({
                "reason": reason,
                "payment_id": payment_id.map(|p| p.as_str()),
                "attempt": job.attempt,
            }),
            recorded_at: Utc::now(),
        })
        .await
}
