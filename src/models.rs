//! Shared data model (§3): the types that flow between adapters, cache,
//! registry and consumer. Kept free of any per-adapter logic.

use serde::{Deserialize, Serialize};

/// A search hit. `(platform_tag, id)` is globally unique; `id` is opaque
/// within the platform that issued it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail_url: Option<String>,
    pub canonical_url: String,
    pub platform_tag: String,
    pub description: Option<String>,
    pub duration_seconds: Option<u64>,
    pub views: Option<u64>,
    pub instance: Option<String>,
}

/// Full detail view, layered on top of a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    #[serde(flatten)]
    pub summary: VideoSummary,
    pub likes: Option<u64>,
    pub dislikes: Option<u64>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub available_qualities: Vec<String>,
}

/// A playable media URL. Implementations MAY refuse to cache beyond 30
/// minutes since direct URLs are often short-lived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamHandle {
    pub direct_url: String,
    pub quality_tag: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl StreamHandle {
    /// A stream handle expiring `minutes` from now.
    pub fn expiring_in(direct_url: impl Into<String>, quality_tag: impl Into<String>, minutes: i64, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            direct_url: direct_url.into(),
            quality_tag: quality_tag.into(),
            expires_at: Some(now + chrono::Duration::minutes(minutes)),
        }
    }

    /// Time remaining until `expires_at`, for consumer-side scheduling
    /// (§3). `None` if this handle carries no expiry, or if it has already
    /// expired as of `now`.
    pub fn time_remaining(&self, now: chrono::DateTime<chrono::Utc>) -> Option<std::time::Duration> {
        let expires_at = self.expires_at?;
        (expires_at - now).to_std().ok()
    }
}

/// Static, read-only-after-start configuration for one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    pub enabled: bool,
    pub credentials: Option<PlatformCredentials>,
    pub endpoints: Vec<String>,
    /// Catch-all for per-platform knobs (timeouts, quality preferences, ...).
    #[serde(default)]
    pub options: std::collections::HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformCredentials {
    pub api_key: Option<String>,
    pub api_token: Option<String>,
    pub cookie_file: Option<String>,
}

/// Which `ServiceType` the HTTP Router and Resilience Kernel key sessions
/// and breakers by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Discord,
    Youtube,
    Rumble,
    Odysee,
    Peertube,
    Generic,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Discord => "discord",
            ServiceType::Youtube => "youtube",
            ServiceType::Rumble => "rumble",
            ServiceType::Odysee => "odysee",
            ServiceType::Peertube => "peertube",
            ServiceType::Generic => "generic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_remaining_is_none_without_expiry() {
        let handle = StreamHandle {
            direct_url: "https://cdn.example.com/x.m3u8".to_string(),
            quality_tag: "best".to_string(),
            expires_at: None,
        };
        assert_eq!(handle.time_remaining(chrono::Utc::now()), None);
    }

    #[test]
    fn time_remaining_counts_down_to_expiry() {
        let now = chrono::Utc::now();
        let handle = StreamHandle::expiring_in("https://cdn.example.com/x.m3u8", "best", 30, now);
        let remaining = handle.time_remaining(now).unwrap();
        assert!(remaining.as_secs() <= 30 * 60 && remaining.as_secs() > 29 * 60);
    }

    #[test]
    fn time_remaining_is_none_once_expired() {
        let now = chrono::Utc::now();
        let handle = StreamHandle::expiring_in("https://cdn.example.com/x.m3u8", "best", 30, now);
        let later = now + chrono::Duration::minutes(31);
        assert_eq!(handle.time_remaining(later), None);
    }
}
