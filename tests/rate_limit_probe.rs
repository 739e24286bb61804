//! Broker ceiling probes against the shared rate limiter.

use rustfx::domain::errors::GatewayError;
use rustfx::infrastructure::core::rate_limiter::{MethodClass, RateLimitConfig, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn twenty_private_gets_stay_under_six_per_second() {
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));
    let started = Instant::now();

    let mut handles = Vec::new();
    for i in 0..20u32 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move {
            limiter
                .acquire(MethodClass::PrivateGet, Duration::from_secs(60))
                .await
                .expect("no probe request may be rejected");
            (i, started.elapsed())
        }));
    }

    let mut grants = Vec::new();
    for handle in handles {
        grants.push(handle.await.unwrap());
    }
    assert_eq!(grants.len(), 20, "every queued request is eventually granted");

    let mut times: Vec<Duration> = grants.iter().map(|(_, at)| *at).collect();
    times.sort();

    // No sliding one-second window contains more than 6 grants.
    for (i, &start) in times.iter().enumerate() {
        let in_window = times[i..]
            .iter()
            .take_while(|&&t| t < start + Duration::from_secs(1))
            .count();
        assert!(in_window <= 6, "sliding window held {in_window} grants");
    }

    // 20 grants at 6/sec need at least two seconds of queueing.
    assert!(*times.last().unwrap() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn sequential_acquires_drain_in_submission_order() {
    let limiter = RateLimiter::new(RateLimitConfig::default());
    let mut last = Duration::ZERO;
    let started = Instant::now();

    for _ in 0..15 {
        limiter
            .acquire(MethodClass::PrivateGet, Duration::from_secs(60))
            .await
            .unwrap();
        let at = started.elapsed();
        assert!(at >= last, "grants must be monotonic in submission order");
        last = at;
    }
}

#[tokio::test(start_paused = true)]
async fn post_bucket_is_stricter_than_get_bucket() {
    let limiter = RateLimiter::new(RateLimitConfig::default());

    // One POST passes, the second must wait a full second.
    limiter
        .acquire(MethodClass::PrivatePost, Duration::from_secs(10))
        .await
        .unwrap();
    let started = Instant::now();
    limiter
        .acquire(MethodClass::PrivatePost, Duration::from_secs(10))
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(990));

    // GETs remain unaffected by the drained POST bucket.
    for _ in 0..6 {
        limiter
            .acquire(MethodClass::PrivateGet, Duration::from_millis(10))
            .await
            .unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_cancellation_is_prompt() {
    let limiter = RateLimiter::new(RateLimitConfig {
        ws_sub_per_sec: 1.0,
        ..RateLimitConfig::default()
    });
    limiter
        .acquire(MethodClass::WsSubscribe, Duration::from_secs(1))
        .await
        .unwrap();

    let started = Instant::now();
    let err = limiter
        .acquire(MethodClass::WsSubscribe, Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Cancelled));
    // The cancellation resolves at the deadline, not after the refill.
    assert!(started.elapsed() < Duration::from_millis(200));
}
