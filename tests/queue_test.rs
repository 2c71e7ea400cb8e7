mod common;

use {
    common::*,
    chrono::Utc,
    pay_pipeline::{
        domain::job::{NackOutcome, NewJob, RetryPolicy},
        store::JobQueue,
        store::memory::MemoryJobQueue,
    },
    std::time::Duration,
};

const LEASE: Duration = Duration::from_secs(30);

fn queue() -> MemoryJobQueue {
    MemoryJobQueue::new(RetryPolicy::new(
        Duration::from_secs(1),
        Duration::from_secs(300),
    ))
}

fn job(n: u32) -> NewJob {
    processing_job(&format!("evt-{n}"), "555001")
}

#[tokio::test]
async fn enqueue_dequeue_ack_roundtrip() {
    let q = queue();
    let id = q.enqueue(job(1), None).await.unwrap();

    let leased = q.dequeue(LEASE).await.unwrap().unwrap();
    assert_eq!(leased.id, id);
    assert_eq!(leased.attempt, 0);

    // Leased job is invisible to other consumers.
    assert!(q.dequeue(LEASE).await.unwrap().is_none());

    q.ack(id).await.unwrap();
    assert!(q.dequeue(LEASE).await.unwrap().is_none());
    assert_eq!(q.ready_len().await, 0);
}

#[tokio::test]
async fn delayed_job_is_invisible_until_available() {
    let q = queue();
    let id = q
        .enqueue(job(1), Some(Duration::from_secs(60)))
        .await
        .unwrap();

    assert!(q.dequeue(LEASE).await.unwrap().is_none());
    let queued = q.peek(id).await.unwrap();
    assert!(queued.available_at > Utc::now());
}

#[tokio::test]
async fn nack_backoff_is_strictly_increasing_up_to_cap() {
    // Millisecond base so the test can wait out the backoff for real.
    let q = MemoryJobQueue::new(RetryPolicy::new(
        Duration::from_millis(10),
        Duration::from_secs(300),
    ));
    let mut new_job = job(1);
    new_job.max_attempts = 10;
    q.enqueue(new_job, None).await.unwrap();

    let mut prev_delay = chrono::TimeDelta::zero();
    for round in 0..4 {
        let leased = q.dequeue(LEASE).await.unwrap().unwrap();
        let nacked_at = Utc::now();
        let outcome = q.nack(leased.id, "transient", None).await.unwrap();
        let NackOutcome::Retried { available_at } = outcome else {
            panic!("expected retry, got {outcome:?}");
        };
        let delay = available_at - nacked_at;
        assert!(
            delay > prev_delay,
            "round {round}: delay {delay} not greater than previous {prev_delay}"
        );
        prev_delay = delay;

        let wait = (available_at - Utc::now()).num_milliseconds().max(0) as u64;
        tokio::time::sleep(Duration::from_millis(wait + 10)).await;
    }
}

#[tokio::test]
async fn job_dead_letters_after_max_attempts() {
    let q = queue();
    let mut new_job = job(1);
    new_job.max_attempts = 2;
    let id = q.enqueue(new_job, None).await.unwrap();

    let leased = q.dequeue(LEASE).await.unwrap().unwrap();
    let outcome = q
        .nack(leased.id, "fail 1", Some(Duration::ZERO))
        .await
        .unwrap();
    assert!(matches!(outcome, NackOutcome::Retried { .. }));

    let leased = q.dequeue(LEASE).await.unwrap().unwrap();
    assert_eq!(leased.attempt, 1);
    let outcome = q
        .nack(leased.id, "fail 2", Some(Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(outcome, NackOutcome::DeadLettered);

    let dead = q.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].job.id, id);
    assert_eq!(dead[0].reason, "fail 2");
    assert!(q.dequeue(LEASE).await.unwrap().is_none());
}

#[tokio::test]
async fn expired_lease_makes_job_visible_again() {
    let q = queue();
    let id = q.enqueue(job(1), None).await.unwrap();

    // Worker "crashes": dequeues with a tiny lease and never acks.
    let leased = q.dequeue(Duration::from_millis(20)).await.unwrap().unwrap();
    assert_eq!(leased.id, id);

    tokio::time::sleep(Duration::from_millis(40)).await;

    let redelivered = q.dequeue(LEASE).await.unwrap().unwrap();
    assert_eq!(redelivered.id, id);
    // Lease expiry is not a nack; the attempt counter is untouched.
    assert_eq!(redelivered.attempt, 0);
}

#[tokio::test]
async fn ack_after_lease_expiry_is_harmless() {
    let q = queue();
    let id = q.enqueue(job(1), None).await.unwrap();

    let _ = q.dequeue(Duration::from_millis(10)).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    // The slow worker acks after losing its lease; the job must survive.
    q.ack(id).await.unwrap();
    assert!(q.dequeue(LEASE).await.unwrap().is_some());
}

#[tokio::test]
async fn bury_skips_retries() {
    let q = queue();
    q.enqueue(job(1), None).await.unwrap();

    let leased = q.dequeue(LEASE).await.unwrap().unwrap();
    q.bury(leased.id, "undeserializable payload").await.unwrap();

    assert!(q.dequeue(LEASE).await.unwrap().is_none());
    let dead = q.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].reason, "undeserializable payload");
}

#[tokio::test]
async fn dequeue_prefers_oldest_available() {
    let q = queue();
    let first = q.enqueue(job(1), None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    q.enqueue(job(2), None).await.unwrap();

    let leased = q.dequeue(LEASE).await.unwrap().unwrap();
    assert_eq!(leased.id, first);
}
