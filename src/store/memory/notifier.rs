use {
    crate::domain::{error::PipelineError, job::NotificationJob},
    crate::store::NotificationSink,
    async_trait::async_trait,
    std::sync::atomic::{AtomicU32, Ordering},
    tokio::sync::Mutex,
};

/// Recording sink: remembers every delivered notification and can be told
/// to fail the next N sends to exercise the retry path.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationJob>>,
    fail_next: AtomicU32,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<NotificationJob> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send(&self, message: &NotificationJob) -> Result<(), PipelineError> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(PipelineError::Store("notification transport down".into()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}
