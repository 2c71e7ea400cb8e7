use {
    crate::domain::error::PipelineError,
    crate::store::KvCache,
    async_trait::async_trait,
    chrono::{DateTime, Duration as ChronoDuration, Utc},
    std::collections::HashMap,
    std::sync::atomic::{AtomicBool, Ordering},
    std::time::Duration,
    tokio::sync::Mutex,
};

struct Entry {
    value: serde_json::Value,
    expires_at: DateTime<Utc>,
}

/// In-memory TTL cache. `poison` flips it into a failing mode so tests can
/// verify that cache outages degrade to direct store reads.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    poisoned: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), PipelineError> {
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(PipelineError::Store("cache unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, PipelineError> {
        self.check()?;
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(e) if e.expires_at > Utc::now() => Ok(Some(e.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), PipelineError> {
        self.check()?;
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Utc::now() + ChronoDuration::from_std(ttl).unwrap_or_default(),
            },
        );
        Ok(())
    }
}
