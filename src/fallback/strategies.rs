//! Default per-platform strategy lists, ported verbatim (priorities and
//! limitations) from `PlatformFallbackManager._setup_default_strategies`.

use std::collections::HashMap;

use super::{FallbackMode, FallbackStrategy};

fn strategy(mode: FallbackMode, description: &str, limitations: &[&str], priority: u32) -> FallbackStrategy {
    FallbackStrategy {
        mode,
        description: description.to_string(),
        limitations: limitations.iter().map(|s| s.to_string()).collect(),
        priority,
        enabled: true,
    }
}

pub fn default_strategies() -> HashMap<String, Vec<FallbackStrategy>> {
    let mut map = HashMap::new();

    map.insert(
        "youtube".to_string(),
        vec![
            strategy(
                FallbackMode::ApiPrimary,
                "Normal YouTube API usage with quota management",
                &["subject to daily quota limits", "no access to private/age-restricted content"],
                1,
            ),
            strategy(
                FallbackMode::YtdlpAuthenticated,
                "Use yt-dlp with browser cookies for full access",
                &["depends on cookie health", "slower than api for searches", "may trigger rate limiting"],
                2,
            ),
            strategy(
                FallbackMode::YtdlpPublic,
                "Use yt-dlp without authentication",
                &[
                    "no access to private/age-restricted content",
                    "limited video quality options",
                    "higher chance of extraction failures",
                    "may encounter captchas",
                ],
                3,
            ),
            strategy(
                FallbackMode::CacheOnly,
                "Return only cached results",
                &["no new searches possible", "limited to previously cached content", "results may be outdated"],
                4,
            ),
            strategy(
                FallbackMode::CrossPlatform,
                "Search other platforms for similar content",
                &["different content catalog", "may not find exact matches", "quality and availability varies"],
                5,
            ),
            strategy(FallbackMode::Disabled, "Disable YouTube platform entirely", &["no youtube functionality available"], 6),
        ],
    );

    map.insert(
        "rumble".to_string(),
        vec![
            strategy(
                FallbackMode::PublicOnly,
                "Access only public Rumble content without authentication",
                &["no access to private channels", "no personalized content", "limited search capabilities"],
                1,
            ),
            strategy(
                FallbackMode::LimitedSearch,
                "Basic public search functionality",
                &["reduced search accuracy", "no trending or recommended content"],
                2,
            ),
            strategy(FallbackMode::Disabled, "Disable Rumble platform", &["no rumble functionality available"], 3),
        ],
    );

    map.insert(
        "odysee".to_string(),
        vec![
            strategy(
                FallbackMode::PublicOnly,
                "Access public Odysee content without authentication",
                &["no access to private content", "no personalized recommendations", "basic search only"],
                1,
            ),
            strategy(FallbackMode::Disabled, "Disable Odysee platform", &["no odysee functionality available"], 2),
        ],
    );

    map.insert(
        "peertube".to_string(),
        vec![
            strategy(
                FallbackMode::PublicOnly,
                "Access public PeerTube instances without authentication",
                &["no access to private content", "federation coverage may shrink"],
                1,
            ),
            strategy(FallbackMode::Disabled, "Disable PeerTube platform", &["no peertube functionality available"], 2),
        ],
    );

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_priorities_are_ordered_api_primary_first() {
        let strategies = default_strategies();
        let youtube = &strategies["youtube"];
        let best = youtube.iter().min_by_key(|s| s.priority).unwrap();
        assert_eq!(best.mode, FallbackMode::ApiPrimary);
    }

    #[test]
    fn rumble_and_odysee_both_lead_with_public_only() {
        let strategies = default_strategies();
        for platform in ["rumble", "odysee", "peertube"] {
            let best = strategies[platform].iter().min_by_key(|s| s.priority).unwrap();
            assert_eq!(best.mode, FallbackMode::PublicOnly);
        }
    }
}
