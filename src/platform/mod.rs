//! Platform Contract (§4.D)
//!
//! One combined async trait every adapter implements, rather than several
//! ISP-style sub-traits: this domain has one capability set per adapter,
//! not optional mixins.

pub mod cache_wrap;
pub mod url_patterns;

use async_trait::async_trait;

use crate::errors::BrokerResult;
use crate::models::{StreamHandle, VideoDetails, VideoSummary};

/// Every source adapter implements this uniform contract. The base (default)
/// methods are not provided here as trait defaults because each adapter's
/// cache-wrap and resilience wiring needs adapter-specific cache keys and
/// service names; instead `cache_wrap` supplies the shared logic as a
/// free function every `search`/`get_details`/`extract_stream_url`
/// implementation calls into (§4.D "shared helpers").
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    /// Stable lowercase tag used in cache keys and `VideoSummary::platform_tag`.
    fn name(&self) -> &str;

    async fn initialize(&self) -> BrokerResult<()>;

    async fn search(&self, query: &str, max: usize) -> BrokerResult<Vec<VideoSummary>>;

    async fn get_details(&self, id: &str) -> BrokerResult<Option<VideoDetails>>;

    async fn extract_stream_url(&self, id: &str) -> BrokerResult<Option<StreamHandle>>;

    /// Extract this platform's opaque id from a URL it recognizes, or `None`.
    fn classify_url(&self, url: &str) -> Option<String>;

    /// Whether this adapter's URL-pattern table matches `url` at all.
    fn owns_url(&self, url: &str) -> bool {
        self.classify_url(url).is_some()
    }

    async fn shutdown(&self) -> BrokerResult<()>;

    /// Downcast hook so the Registry can reach adapter-specific operations
    /// (e.g. Rumble's quality-selectable stream extraction) that don't fit
    /// the uniform contract every adapter shares.
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
