use {
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    pay_pipeline::{
        AppState,
        adapters::{gateway::HttpPaymentGateway, signature::SignatureVerifier, webhook},
        config::PipelineConfig,
        domain::job::RetryPolicy,
        services::worker,
        store::memory::{
            MemoryAuditLog, MemoryCache, MemoryIdempotencyStore, MemoryJobQueue,
            MemoryProfileStore, RecordingNotifier,
        },
    },
    std::{sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
    tower_http::timeout::TimeoutLayer,
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = PipelineConfig::from_env().expect("invalid configuration");
    if config.webhook_secret.is_empty() {
        tracing::warn!("WEBHOOK_SECRET is empty, every signed request will be rejected");
    }

    let verifier = SignatureVerifier::new(&config.webhook_secret, config.signature_freshness);
    let gateway = HttpPaymentGateway::new(&config.gateway_base_url, &config.gateway_token);
    let policy = RetryPolicy::new(config.backoff_base, config.backoff_max);

    let state = AppState {
        config: Arc::new(config.clone()),
        verifier,
        queue: Arc::new(MemoryJobQueue::new(policy)),
        profiles: Arc::new(MemoryProfileStore::new()),
        idempotency: Arc::new(MemoryIdempotencyStore::new()),
        audit: Arc::new(MemoryAuditLog::new()),
        notifier: Arc::new(RecordingNotifier::new()),
        cache: Arc::new(MemoryCache::new()),
        gateway: Arc::new(gateway),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = worker::spawn_workers(&state, &shutdown_rx);

    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/events", post(webhook::events_handler))
        // Webhook bodies are small; the processor's own timeout is the hard
        // ceiling, ours must stay well under it.
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("failed to bind listener");
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    shutdown_tx.send(true).ok();
    for handle in workers {
        handle.await.ok();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
