use {
    super::error::PipelineError,
    super::id::{EventId, PaymentId},
    chrono::{DateTime, Utc},
    serde::Deserialize,
};

/// Actions we act on. Everything else is acknowledged and ignored — the
/// processor routinely sends test pings and event kinds we don't handle.
const ACTIONABLE: &[&str] = &["payment.created", "payment.updated"];

/// Raw wire envelope as the processor posts it.
#[derive(Debug, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub action: Option<String>,
    pub data: EventData,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub live_mode: bool,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub id: EventObjectId,
}

/// The object id inside `data` — a payment id for payment events. Accepts
/// string or numeric JSON like the event id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EventObjectId {
    Str(String),
    Num(u64),
}

impl EventObjectId {
    pub fn to_canonical(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Num(n) => n.to_string(),
        }
    }
}

/// Canonical, immutable representation of an actionable inbound event.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    event_id: EventId,
    event_type: String,
    payment_id: PaymentId,
    live_mode: bool,
    received_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payment_id(&self) -> &PaymentId {
        &self.payment_id
    }

    pub fn live_mode(&self) -> bool {
        self.live_mode
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Outcome of normalization: either a canonical event we act on, or a
/// well-formed event we acknowledge without enqueueing.
#[derive(Debug)]
pub enum Normalized {
    Actionable(PaymentEvent),
    Ignored { event_type: String },
}

/// Parse the raw body against the envelope schema.
///
/// Malformed JSON or a missing required field is a hard validation error
/// (the caller answers 400). A well-formed envelope whose action is not on
/// the allow-list normalizes to [`Normalized::Ignored`].
pub fn normalize(raw: &[u8], received_at: DateTime<Utc>) -> Result<Normalized, PipelineError> {
    let envelope: EventEnvelope = serde_json::from_slice(raw)
        .map_err(|e| PipelineError::Validation(format!("malformed event body: {e}")))?;
    normalize_envelope(&envelope, received_at)
}

/// Same as [`normalize`], starting from an already-parsed envelope. The
/// webhook handler parses the envelope early because the signature manifest
/// needs `data.id` before anything else can happen.
pub fn normalize_envelope(
    envelope: &EventEnvelope,
    received_at: DateTime<Utc>,
) -> Result<Normalized, PipelineError> {
    let event_type = envelope
        .action
        .clone()
        .unwrap_or_else(|| envelope.kind.clone());

    if !ACTIONABLE.contains(&event_type.as_str()) {
        return Ok(Normalized::Ignored { event_type });
    }

    let payment_id = PaymentId::new(envelope.data.id.to_canonical())?;

    Ok(Normalized::Actionable(PaymentEvent {
        event_id: envelope.id.clone(),
        event_type,
        payment_id,
        live_mode: envelope.live_mode,
        received_at,
    }))
}
