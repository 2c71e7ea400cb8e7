use {
    crate::domain::{audit::NewAuditEntry, error::PipelineError},
    crate::store::AuditLog,
    async_trait::async_trait,
    tokio::sync::Mutex,
};

/// Append-only in-memory audit trail.
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<NewAuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<NewAuditEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn entries_for_event(&self, event_id: &str) -> Vec<NewAuditEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.event_id.as_deref() == Some(event_id))
            .cloned()
            .collect()
    }

    pub async fn entries_for_profile(&self, profile_id: &str) -> Vec<NewAuditEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.profile_id.as_deref() == Some(profile_id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, entry: NewAuditEntry) -> Result<(), PipelineError> {
        self.entries.lock().await.push(entry);
        Ok(())
    }
}
