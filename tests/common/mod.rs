#![allow(dead_code)]

use {
    async_trait::async_trait,
    chrono::Utc,
    pay_pipeline::{
        AppState,
        adapters::signature::{SignatureVerifier, sign_manifest},
        config::PipelineConfig,
        domain::{
            error::PipelineError,
            gateway::{GatewayPayment, GatewayPaymentStatus, PaymentGateway},
            id::{EventId, PaymentId, ProfileId},
            job::{JobPayload, NewJob, ProcessingJob, RetryPolicy},
            money::{Currency, Money, MoneyAmount},
            profile::PayableProfile,
        },
        store::{
            ProfileStore,
            memory::{
                MemoryAuditLog, MemoryCache, MemoryIdempotencyStore, MemoryJobQueue,
                MemoryProfileStore, RecordingNotifier,
            },
        },
    },
    std::{
        collections::HashMap,
        sync::Arc,
        sync::atomic::{AtomicU32, Ordering},
    },
    tokio::sync::Mutex,
};

pub const TEST_SECRET: &str = "whsec_test";

/// Programmable stand-in for the processor's payment API.
#[derive(Default)]
pub struct StubGateway {
    payments: Mutex<HashMap<String, GatewayPayment>>,
    fail_next: AtomicU32,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, payment: GatewayPayment) {
        self.payments
            .lock()
            .await
            .insert(payment.payment_id.as_str().to_string(), payment);
    }

    /// Make the next `n` fetches fail with a transient gateway error.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn fetch_payment(&self, id: &PaymentId) -> Result<GatewayPayment, PipelineError> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(PipelineError::Gateway("gateway down".into()));
        }
        self.payments
            .lock()
            .await
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("payment {id}")))
    }
}

/// One fully isolated pipeline instance: fresh stores, fresh queue, fresh
/// everything. Keeps the concrete types alongside the trait-object state so
/// tests can reach inspection hooks.
pub struct Harness {
    pub state: AppState,
    pub queue: Arc<MemoryJobQueue>,
    pub profiles: Arc<MemoryProfileStore>,
    pub idempotency: Arc<MemoryIdempotencyStore>,
    pub audit: Arc<MemoryAuditLog>,
    pub notifier: Arc<RecordingNotifier>,
    pub cache: Arc<MemoryCache>,
    pub gateway: Arc<StubGateway>,
}

pub fn harness() -> Harness {
    harness_with(PipelineConfig {
        webhook_secret: TEST_SECRET.to_string(),
        ..PipelineConfig::default()
    })
}

pub fn harness_with(config: PipelineConfig) -> Harness {
    let queue = Arc::new(MemoryJobQueue::new(RetryPolicy::new(
        config.backoff_base,
        config.backoff_max,
    )));
    let profiles = Arc::new(MemoryProfileStore::new());
    let idempotency = Arc::new(MemoryIdempotencyStore::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let cache = Arc::new(MemoryCache::new());
    let gateway = Arc::new(StubGateway::new());

    let verifier = SignatureVerifier::new(&config.webhook_secret, config.signature_freshness);
    let state = AppState {
        config: Arc::new(config),
        verifier,
        queue: queue.clone(),
        profiles: profiles.clone(),
        idempotency: idempotency.clone(),
        audit: audit.clone(),
        notifier: notifier.clone(),
        cache: cache.clone(),
        gateway: gateway.clone(),
    };

    Harness {
        state,
        queue,
        profiles,
        idempotency,
        audit,
        notifier,
        cache,
        gateway,
    }
}

// ── Builders ───────────────────────────────────────────────────────────────

pub fn profile_id(s: &str) -> ProfileId {
    ProfileId::new(s).unwrap()
}

pub fn payment_id(s: &str) -> PaymentId {
    PaymentId::new(s).unwrap()
}

pub fn brl(cents: i64) -> Money {
    Money::new(MoneyAmount::new(cents).unwrap(), Currency::Brl)
}

pub fn pending_profile(id: &str) -> PayableProfile {
    PayableProfile::new_pending(profile_id(id), brl(5500), Utc::now())
}

pub fn approved_payment(pay: &str, prof: &str) -> GatewayPayment {
    GatewayPayment {
        payment_id: payment_id(pay),
        profile_id: Some(profile_id(prof)),
        status: GatewayPaymentStatus::Approved,
        money: brl(5500),
    }
}

pub fn rejected_payment(pay: &str, prof: &str) -> GatewayPayment {
    GatewayPayment {
        payment_id: payment_id(pay),
        profile_id: Some(profile_id(prof)),
        status: GatewayPaymentStatus::Rejected,
        money: brl(5500),
    }
}

/// Seed a pending profile and its approved payment, the normal starting
/// point for activation scenarios.
pub async fn seed_activatable(h: &Harness, prof: &str, pay: &str) {
    h.profiles.insert(pending_profile(prof)).await.unwrap();
    h.gateway.put(approved_payment(pay, prof)).await;
}

pub fn processing_payload(event_id: &str, pay: &str) -> Vec<u8> {
    serde_json::to_vec(&JobPayload::Processing(ProcessingJob {
        event_id: EventId::new(event_id).unwrap(),
        event_type: "payment.updated".into(),
        payment_id: payment_id(pay),
    }))
    .unwrap()
}

pub fn processing_job(event_id: &str, pay: &str) -> NewJob {
    NewJob {
        payload: processing_payload(event_id, pay),
        idempotency_key: format!("event:{event_id}"),
        correlation_id: format!("corr-{event_id}"),
        max_attempts: 5,
    }
}

// ── Webhook request builders ───────────────────────────────────────────────

pub fn event_body(event_id: &str, action: &str, data_id: &str) -> String {
    serde_json::json!({
        "id": event_id,
        "type": "payment",
        "action": action,
        "data": {"id": data_id},
        "date_created": "2026-01-05T10:00:00Z",
        "user_id": 44,
        "live_mode": true,
    })
    .to_string()
}

/// Signature header value for a request carrying `data_id`, signed now.
pub fn signed_header(data_id: &str, request_id: &str) -> String {
    let ts = Utc::now().timestamp();
    let v1 = sign_manifest(TEST_SECRET, data_id, request_id, ts);
    format!("ts={ts},v1={v1}")
}
