//! The closed set of fallback modes (§4.G). Two families coexist in one
//! enum per the open-question decision in §9: generic modes usable by any
//! platform, and YouTube-specific modes for the API-gated adapter's
//! multi-step degradation cascade.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    // Generic modes
    ApiOnly,
    PublicOnly,
    LimitedSearch,
    ReadOnly,
    Disabled,
    // YouTube-specific modes
    ApiPrimary,
    YtdlpAuthenticated,
    YtdlpPublic,
    CacheOnly,
    CrossPlatform,
}

const WRITE_OPERATIONS: &[&str] = &["upload", "comment", "like", "subscribe", "playlist_add"];

impl FallbackMode {
    /// Table-driven operation restriction, ported from
    /// `should_use_fallback_for_operation`.
    pub fn restricts(&self, operation: &str) -> (bool, Option<String>) {
        match self {
            FallbackMode::Disabled => (true, Some("platform is disabled".into())),
            FallbackMode::ReadOnly if WRITE_OPERATIONS.contains(&operation) => {
                (true, Some("write operations disabled in read-only mode".into()))
            }
            FallbackMode::LimitedSearch
                if matches!(operation, "advanced_search" | "personalized_search" | "trending") =>
            {
                (true, Some("advanced search features disabled".into()))
            }
            FallbackMode::PublicOnly
                if matches!(operation, "private_content" | "authenticated_content" | "user_playlists") =>
            {
                (true, Some("private content not available in public-only mode".into()))
            }
            FallbackMode::ApiOnly if matches!(operation, "stream_extraction" | "download") => {
                (true, Some("stream extraction may be limited in api-only mode".into()))
            }
            FallbackMode::ApiPrimary if matches!(operation, "private_content" | "age_restricted_content") => {
                (true, Some("content requires authentication".into()))
            }
            FallbackMode::YtdlpAuthenticated => (false, None),
            FallbackMode::YtdlpPublic
                if matches!(operation, "private_content" | "age_restricted_content" | "user_playlists") =>
            {
                (true, Some("authentication required for this content".into()))
            }
            FallbackMode::CacheOnly if matches!(operation, "search" | "stream_extraction" | "metadata_fetch") => {
                (true, Some("only cached content available".into()))
            }
            FallbackMode::CrossPlatform if operation != "search" => {
                (true, Some("content not available on alternative platforms".into()))
            }
            _ => (false, None),
        }
    }

    pub fn recommendations(&self, platform: &str) -> Vec<String> {
        match self {
            FallbackMode::Disabled => vec![
                format!("the {platform} platform is temporarily disabled"),
                "try using alternative platforms for your search".into(),
                "check back later when the issue is resolved".into(),
            ],
            FallbackMode::LimitedSearch => vec![
                format!("{platform} is running with limited search capabilities"),
                "try simpler search terms for better results".into(),
                "some videos may not be accessible".into(),
            ],
            FallbackMode::PublicOnly => vec![
                format!("{platform} can only access public content currently"),
                "private or authenticated content is not available".into(),
                "search results may be limited".into(),
            ],
            FallbackMode::ApiOnly => vec![
                format!("{platform} is using api-only mode"),
                "some features may be limited or unavailable".into(),
            ],
            FallbackMode::ApiPrimary => vec![
                "youtube is operating normally".into(),
                "all public content is accessible".into(),
                "age-restricted content may require alternative methods".into(),
            ],
            FallbackMode::YtdlpAuthenticated => vec![
                "using alternative youtube access method with authentication".into(),
                "all content should be accessible".into(),
                "searches may take slightly longer than usual".into(),
            ],
            FallbackMode::YtdlpPublic => vec![
                "using alternative youtube access method without authentication".into(),
                "age-restricted and private content is not available".into(),
                "try using direct video urls for better results".into(),
            ],
            FallbackMode::CacheOnly => vec![
                "only previously cached results are available".into(),
                "new searches may return no results".into(),
            ],
            FallbackMode::CrossPlatform => vec![
                "searching alternative platforms for similar content".into(),
                "exact matches are not guaranteed".into(),
            ],
            FallbackMode::ReadOnly => vec!["write operations are temporarily unavailable".into()],
        }
    }
}
