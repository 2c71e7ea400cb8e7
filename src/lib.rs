pub mod adapters;
pub mod config;
pub mod domain;
pub mod services;
pub mod store;

use {
    crate::{
        adapters::signature::SignatureVerifier,
        config::PipelineConfig,
        domain::gateway::PaymentGateway,
        store::{AuditLog, IdempotencyStore, JobQueue, KvCache, NotificationSink, ProfileStore},
    },
    std::sync::Arc,
};

/// Everything the pipeline components need, injected explicitly. No
/// singletons: tests build as many independent instances as they like.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PipelineConfig>,
    pub verifier: SignatureVerifier,
    pub queue: Arc<dyn JobQueue>,
    pub profiles: Arc<dyn ProfileStore>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub audit: Arc<dyn AuditLog>,
    pub notifier: Arc<dyn NotificationSink>,
    pub cache: Arc<dyn KvCache>,
    pub gateway: Arc<dyn PaymentGateway>,
}
