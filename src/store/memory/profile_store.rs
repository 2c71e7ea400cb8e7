use {
    crate::domain::{error::PipelineError, id::ProfileId, profile::PayableProfile},
    crate::store::ProfileStore,
    async_trait::async_trait,
    std::collections::HashMap,
    tokio::sync::RwLock,
};

/// In-memory profile store. One lock around the map makes `update` a true
/// compare-and-swap: the version check and the write happen under the same
/// guard.
#[derive(Default)]
pub struct MemoryProfileStore {
    rows: RwLock<HashMap<ProfileId, PayableProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, id: &ProfileId) -> Result<Option<PayableProfile>, PipelineError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn insert(&self, profile: PayableProfile) -> Result<(), PipelineError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(profile.id()) {
            return Err(PipelineError::Validation(format!(
                "profile {} already exists",
                profile.id()
            )));
        }
        rows.insert(profile.id().clone(), profile);
        Ok(())
    }

    async fn update(
        &self,
        profile: PayableProfile,
        expected_version: u64,
    ) -> Result<PayableProfile, PipelineError> {
        let mut rows = self.rows.write().await;
        let current = rows
            .get(profile.id())
            .ok_or_else(|| PipelineError::NotFound(format!("profile {}", profile.id())))?;

        if current.version() != expected_version {
            return Err(PipelineError::Conflict {
                id: profile.id().to_string(),
                expected: expected_version,
                actual: current.version(),
            });
        }

        rows.insert(profile.id().clone(), profile.clone());
        Ok(profile)
    }
}
