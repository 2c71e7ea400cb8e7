use {chrono::{DateTime, Utc}, uuid::Uuid};

/// One row in the append-only audit trail. Every inbound event leaves one,
/// actionable or not, as does every permanent processing failure.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub id: Uuid,
    pub entity_type: String,
    pub profile_id: Option<String>,
    pub event_id: Option<String>,
    pub action: String,
    pub actor: String,
    pub correlation_id: Option<String>,
    pub detail: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl NewAuditEntry {
    pub fn event_received(
        event_id: &str,
        actor: &str,
        correlation_id: &str,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            entity_type: "payment_event".to_string(),
            profile_id: None,
            event_id: Some(event_id.to_string()),
            action: "event_received".to_string(),
            actor: actor.to_string(),
            correlation_id: Some(correlation_id.to_string()),
            detail,
            recorded_at: Utc::now(),
        }
    }
}
