//! Cache Port (§4.C): a typed, nullable-returning KV abstraction. The core
//! never requires a cache — `NoopCache` is a fully valid implementation —
//! so every adapter and the Platform Contract's cache-wrap helper depend
//! only on the `CachePort` trait, a narrow storage port behind `Arc<dyn ...>`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{StreamHandle, VideoDetails, VideoSummary};

pub const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(2 * 60 * 60);
pub const DEFAULT_STREAM_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

pub fn search_key(platform: &str, query: &str) -> String {
    format!("search:{platform}:{query}")
}

pub fn metadata_key(platform: &str, id: &str) -> String {
    format!("meta:{platform}:{id}")
}

pub fn stream_key(platform: &str, id: &str, quality: &str) -> String {
    format!("stream:{platform}:{id}:{quality}")
}

/// Miss is not an error: every accessor returns `Option`.
#[async_trait]
pub trait CachePort: Send + Sync {
    async fn get_search_results(&self, platform: &str, query: &str) -> Option<Vec<VideoSummary>>;
    async fn set_search_results(&self, platform: &str, query: &str, results: Vec<VideoSummary>, ttl: Option<Duration>);

    async fn get_video_metadata(&self, platform: &str, id: &str) -> Option<VideoDetails>;
    async fn set_video_metadata(&self, platform: &str, id: &str, details: VideoDetails, ttl: Option<Duration>);

    async fn get_stream_url(&self, platform: &str, id: &str, quality: &str) -> Option<StreamHandle>;
    async fn set_stream_url(&self, platform: &str, id: &str, quality: &str, handle: StreamHandle, ttl: Option<Duration>);

    async fn metrics(&self) -> CacheMetrics;
}

/// Valid no-op implementation: every get misses, every set is dropped.
/// Still counts towards `metrics()` so callers can observe cache pressure
/// even with caching disabled.
#[derive(Default)]
pub struct NoopCache {
    misses: AtomicU64,
}

#[async_trait]
impl CachePort for NoopCache {
    async fn get_search_results(&self, _platform: &str, _query: &str) -> Option<Vec<VideoSummary>> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn set_search_results(&self, _platform: &str, _query: &str, _results: Vec<VideoSummary>, _ttl: Option<Duration>) {}

    async fn get_video_metadata(&self, _platform: &str, _id: &str) -> Option<VideoDetails> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn set_video_metadata(&self, _platform: &str, _id: &str, _details: VideoDetails, _ttl: Option<Duration>) {}

    async fn get_stream_url(&self, _platform: &str, _id: &str, _quality: &str) -> Option<StreamHandle> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn set_stream_url(&self, _platform: &str, _id: &str, _quality: &str, _handle: StreamHandle, _ttl: Option<Duration>) {}

    async fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: 0,
            misses: self.misses.load(Ordering::Relaxed),
            writes: 0,
        }
    }
}

/// In-process cache for tests and single-instance deployments. Expiration is
/// enforced lazily on read; there is no background sweeper.
pub mod memory;
pub use memory::InMemoryCache;
