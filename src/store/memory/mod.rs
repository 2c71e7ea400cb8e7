//! In-memory adapters. These are the reference implementations of the
//! store traits: tests run against them, and the binary uses them until a
//! concrete persistence engine is wired in behind the same seams.

mod audit_log;
mod cache;
mod idempotency;
mod job_queue;
mod notifier;
mod profile_store;

pub use audit_log::MemoryAuditLog;
pub use cache::MemoryCache;
pub use idempotency::MemoryIdempotencyStore;
pub use job_queue::{DeadJob, MemoryJobQueue};
pub use notifier::RecordingNotifier;
pub use profile_store::MemoryProfileStore;
