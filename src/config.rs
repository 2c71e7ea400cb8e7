//! Pipeline configuration, 12-factor style: everything comes from
//! environment variables (or a `.env` file via `dotenvy`), with documented
//! defaults for every knob except the webhook secret.

use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Socket address the HTTP server binds to.
    pub listen_addr: SocketAddr,

    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,

    /// How far a signature timestamp may drift from now before the request
    /// is treated as a replay.
    pub signature_freshness: Duration,

    /// TTL for completed idempotency records, generously beyond the
    /// processor's plausible redelivery window so delayed duplicates are
    /// still caught. In-flight claims expire with the processing lease
    /// instead, so a crashed claimant never wedges the key.
    pub idempotency_ttl: Duration,

    /// Attempts before a job is dead-lettered.
    pub job_max_attempts: u32,

    /// Base and cap for exponential retry backoff.
    pub backoff_base: Duration,
    pub backoff_max: Duration,

    /// Visibility timeout handed out on dequeue. Must exceed the expected
    /// processing time or jobs get redelivered mid-flight.
    pub lease_duration: Duration,

    /// Per-attempt processing budget; past it the worker abandons the job
    /// and lets the lease expire.
    pub processing_timeout: Duration,

    /// Short reschedule used when another worker holds the claim.
    pub contention_delay: Duration,

    /// Concurrent processing workers.
    pub worker_count: usize,

    /// TTL for cached profile reads.
    pub cache_ttl: Duration,

    /// Payment gateway API base URL and access token.
    pub gateway_base_url: String,
    pub gateway_token: String,
}

impl PipelineConfig {
    /// Loads configuration from the environment. Missing or unparsable
    /// values fall back to defaults; only `LISTEN_ADDR` can hard-fail.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but is not a valid socket
    /// address.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        Ok(Self {
            listen_addr,
            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
            signature_freshness: Duration::from_secs(parse_env("SIGNATURE_FRESHNESS_SECS", 300)),
            idempotency_ttl: Duration::from_secs(parse_env(
                "IDEMPOTENCY_TTL_SECS",
                72 * 60 * 60,
            )),
            job_max_attempts: parse_env("JOB_MAX_ATTEMPTS", 5),
            backoff_base: Duration::from_millis(parse_env("BACKOFF_BASE_MS", 1_000)),
            backoff_max: Duration::from_millis(parse_env("BACKOFF_MAX_MS", 300_000)),
            lease_duration: Duration::from_secs(parse_env("LEASE_DURATION_SECS", 30)),
            processing_timeout: Duration::from_secs(parse_env("PROCESSING_TIMEOUT_SECS", 25)),
            contention_delay: Duration::from_millis(parse_env("CONTENTION_DELAY_MS", 2_000)),
            worker_count: parse_env("WORKER_COUNT", 4),
            cache_ttl: Duration::from_secs(parse_env("CACHE_TTL_SECS", 60)),
            gateway_base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.example-pay.com".to_string()),
            gateway_token: std::env::var("GATEWAY_TOKEN").unwrap_or_default(),
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".parse().expect("static addr parses"),
            webhook_secret: String::new(),
            signature_freshness: Duration::from_secs(300),
            idempotency_ttl: Duration::from_secs(72 * 60 * 60),
            job_max_attempts: 5,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(300),
            lease_duration: Duration::from_secs(30),
            processing_timeout: Duration::from_secs(25),
            contention_delay: Duration::from_secs(2),
            worker_count: 4,
            cache_ttl: Duration::from_secs(60),
            gateway_base_url: "https://api.example-pay.com".to_string(),
            gateway_token: String::new(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
