use {
    crate::{
        AppState,
        adapters::{
            api_errors::ApiError,
            signature::{REQUEST_ID_HEADER, SIGNATURE_HEADER, SignatureHeader},
        },
        domain::{
            audit::NewAuditEntry,
            error::PipelineError,
            event::{self, EventEnvelope, Normalized},
            job::{JobPayload, NewJob, ProcessingJob},
        },
    },
    axum::{Json, extract::State, http::HeaderMap},
    chrono::Utc,
    uuid::Uuid,
};

const ACTOR: &str = "webhook";

/// `POST /events` — the only HTTP-facing entry point of the pipeline.
///
/// Verify, normalize, audit, enqueue, return. No business logic runs here:
/// a slow downstream never blocks the response, and retries belong to the
/// queue, not to the processor's redelivery loop.
#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(event_id = tracing::field::Empty, correlation_id = tracing::field::Empty)
)]
pub async fn events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let received_at = Utc::now();
    let correlation_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string());
    tracing::Span::current().record("correlation_id", tracing::field::display(&correlation_id));

    // The signature manifest needs `data.id`, so the envelope is parsed
    // before verification. A body we cannot parse is audited (without
    // echoing it) and rejected with 400.
    let envelope: EventEnvelope = match serde_json::from_str(&body) {
        Ok(env) => env,
        Err(e) => {
            state
                .audit
                .append(NewAuditEntry::event_received(
                    "unknown",
                    ACTOR,
                    &correlation_id,
                    serde_json::json!({"malformed": true}),
                ))
                .await?;
            return Err(PipelineError::Validation(format!("malformed event body: {e}")).into());
        }
    };
    tracing::Span::current().record("event_id", tracing::field::display(envelope.id.as_str()));

    // Authentication failures are never work: respond 401 and write
    // nothing derived from the payload.
    let sig_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PipelineError::Signature("missing x-signature header".into()))?;
    let sig = SignatureHeader::parse(sig_header)?;
    state.verifier.verify(
        &envelope.data.id.to_canonical(),
        &correlation_id,
        &sig,
        received_at,
    )?;

    let normalized = event::normalize_envelope(&envelope, received_at)?;

    match normalized {
        Normalized::Ignored { event_type } => {
            state
                .audit
                .append(NewAuditEntry::event_received(
                    envelope.id.as_str(),
                    ACTOR,
                    &correlation_id,
                    serde_json::json!({"event_type": event_type, "ignored": true}),
                ))
                .await?;
            tracing::info!(event_type, "event acknowledged and ignored");
            Ok(Json(serde_json::json!({"status": "ignored"})))
        }
        Normalized::Actionable(ev) => {
            state
                .audit
                .append(NewAuditEntry::event_received(
                    ev.event_id().as_str(),
                    ACTOR,
                    &correlation_id,
                    serde_json::json!({
                        "event_type": ev.event_type(),
                        "payment_id": ev.payment_id().as_str(),
                        "live_mode": ev.live_mode(),
                    }),
                ))
                .await?;

            let payload = serde_json::to_vec(&JobPayload::Processing(ProcessingJob {
                event_id: ev.event_id().clone(),
                event_type: ev.event_type().to_string(),
                payment_id: ev.payment_id().clone(),
            }))
            .map_err(PipelineError::from)?;
            let job = NewJob {
                payload,
                // The queue-level key dedups the envelope; the semantic
                // dedup happens in the processor's idempotency claim.
                idempotency_key: format!("event:{}", ev.event_id().as_str()),
                correlation_id: correlation_id.clone(),
                max_attempts: state.config.job_max_attempts,
            };
            let job_id = state.queue.enqueue(job, None).await?;

            tracing::info!(job_id = %job_id, payment_id = %ev.payment_id(), "processing job enqueued");
            Ok(Json(serde_json::json!({"status": "accepted"})))
        }
    }
}
