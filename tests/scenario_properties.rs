//! Cross-module scenario tests drawn from the testable properties list:
//! cache round-trip (S6), circuit breaker fail-fast (S4), and prioritizer
//! reordering under a strategy switch (S5), exercised through the public
//! crate API rather than any single module's internals.

use std::time::Duration;

use videobroker::cache::{CachePort, InMemoryCache};
use videobroker::models::{StreamHandle, VideoDetails, VideoSummary};
use videobroker::prioritizer::{PrioritizationStrategy, Prioritizer};
use videobroker::resilience::{CircuitBreakerConfig, ResilienceManager};

fn sample_summary(id: &str, platform: &str) -> VideoSummary {
    VideoSummary {
        id: id.to_string(),
        title: "title".to_string(),
        channel: "channel".to_string(),
        thumbnail_url: None,
        canonical_url: format!("https://example.com/{id}"),
        platform_tag: platform.to_string(),
        description: None,
        duration_seconds: None,
        views: None,
        instance: None,
    }
}

#[tokio::test]
async fn cache_round_trip_returns_what_was_set() {
    let cache = InMemoryCache::new();
    let details = VideoDetails {
        summary: sample_summary("v1", "rumble"),
        likes: Some(10),
        dislikes: Some(1),
        published_at: None,
        available_qualities: vec!["720p".to_string()],
    };

    cache.set_video_metadata("rumble", "v1", details.clone(), None).await;
    let got = cache.get_video_metadata("rumble", "v1").await;
    assert_eq!(got, Some(details));
}

#[tokio::test]
async fn cache_miss_is_not_an_error() {
    let cache = InMemoryCache::new();
    assert!(cache.get_video_metadata("rumble", "never-set").await.is_none());
    assert!(cache.get_search_results("rumble", "never-searched").await.is_none());
}

#[tokio::test]
async fn stream_handle_round_trips_through_cache() {
    let cache = InMemoryCache::new();
    let handle = StreamHandle {
        direct_url: "https://cdn.example.com/stream.m3u8".to_string(),
        quality_tag: "best".to_string(),
        expires_at: None,
    };
    cache.set_stream_url("rumble", "v1", "best", handle.clone(), Some(Duration::from_secs(60))).await;
    assert_eq!(cache.get_stream_url("rumble", "v1", "best").await, Some(handle));
}

/// S4: 5 consecutive failures open the breaker; the 6th call fails fast
/// without ever invoking the backend, and recovers through half-open after
/// the configured number of successes.
#[tokio::test]
async fn breaker_opens_and_recovers_end_to_end() {
    let manager = ResilienceManager::new(CircuitBreakerConfig {
        failure_threshold: 5,
        recovery_timeout: Duration::from_millis(20),
        success_threshold: 3,
        call_timeout: Duration::from_secs(1),
    });
    let breaker = manager.get_or_create("scenario-service").await;

    for _ in 0..5 {
        let _: Result<(), _> = breaker.call(|| async { Err::<(), _>("boom") }).await;
    }

    let mut backend_touched = false;
    let res = breaker
        .call(|| {
            backend_touched = true;
            async { Ok::<_, &str>(()) }
        })
        .await;
    assert!(res.is_err());
    assert!(!backend_touched, "breaker must fail fast without touching the backend while open");

    tokio::time::sleep(Duration::from_millis(30)).await;
    for _ in 0..3 {
        let _: Result<(), _> = breaker.call(|| async { Ok::<(), &str>(()) }).await;
    }
    assert!(breaker.call(|| async { Ok::<(), &str>(()) }).await.is_ok());
}

/// S5: speed_first favors the faster platform; reliability_first flips the
/// order once that platform accumulates consecutive failures.
#[tokio::test]
async fn prioritizer_strategy_switch_changes_order() {
    let prioritizer = Prioritizer::new(PrioritizationStrategy::SpeedFirst);
    for _ in 0..6 {
        prioritizer.record("fast", true, 0.2, None).await;
        prioritizer.record("slow", true, 4.0, None).await;
    }
    assert_eq!(prioritizer.order(&["fast".to_string(), "slow".to_string()]).await, vec!["fast", "slow"]);

    prioritizer.set_strategy(PrioritizationStrategy::ReliabilityFirst).await;
    for _ in 0..4 {
        prioritizer.record("fast", false, 0.2, None).await;
    }
    assert_eq!(prioritizer.order(&["fast".to_string(), "slow".to_string()]).await, vec!["slow", "fast"]);
}
