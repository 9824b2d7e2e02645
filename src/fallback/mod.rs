//! Fallback Strategy Engine (§4.G)
//!
//! Ported directly from the original's `PlatformFallbackManager`
//! (`platform_fallback_manager.py`): the per-platform strategy lists, their
//! priorities, and the `should_use_fallback_for_operation` restriction table
//! are carried over verbatim in meaning. Two distinct `FallbackMode`
//! enumerations (generic + YouTube-specific) coexist per the open question
//! in §9 — they are not merged into separate types, just a single closed
//! enum with both sets of variants, matching how the original keeps them in
//! one `Enum` too.

mod modes;
mod strategies;

pub use modes::FallbackMode;
pub use strategies::default_strategies;

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Daily YouTube Data API quota budget the original hardcodes as
/// `youtube_quota_limit` (default 10000 units).
const YOUTUBE_QUOTA_LIMIT: u64 = 10_000;

/// Mirrors `PlatformFallbackManager`'s `youtube_quota_usage` bookkeeping:
/// accumulated units against a calendar-day budget, plus the error counters
/// `get_youtube_strategy` reads to pick a mode.
#[derive(Debug, Clone, Copy, Default)]
struct YoutubeQuotaState {
    units_used: u64,
    reset_at: Option<DateTime<Utc>>,
    api_errors: u32,
    total_errors: u32,
    cookies_healthy: bool,
}

fn next_utc_midnight(from: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = (from + ChronoDuration::days(1)).date_naive();
    tomorrow.and_hms_opt(0, 0, 0).expect("midnight is always valid").and_utc()
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FallbackStrategy {
    pub mode: FallbackMode,
    pub description: String,
    pub limitations: Vec<String>,
    pub priority: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum HistoryAction {
    Activated,
    Deactivated,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    pub reason: String,
    pub strategy: FallbackStrategy,
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PlatformFallbackState {
    pub active_strategy: Option<FallbackStrategy>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FallbackReport {
    pub platforms: HashMap<String, PlatformFallbackState>,
}

/// Maintains, per platform, an ordered set of degraded operating modes and
/// an "active mode" pointer.
pub struct FallbackEngine {
    strategies: HashMap<String, Vec<FallbackStrategy>>,
    state: RwLock<HashMap<String, PlatformFallbackState>>,
    /// Fraction of daily quota used before the API-gated platform
    /// auto-escalates (default 0.8, §4.G).
    pub quota_conservation_threshold: f64,
    /// Monitoring loop cadence (default 30 minutes, §4.G).
    pub retry_interval: std::time::Duration,
    youtube_quota: RwLock<YoutubeQuotaState>,
}

impl FallbackEngine {
    pub fn new() -> Self {
        Self {
            strategies: default_strategies(),
            state: RwLock::new(HashMap::new()),
            quota_conservation_threshold: 0.8,
            retry_interval: std::time::Duration::from_secs(30 * 60),
            youtube_quota: RwLock::new(YoutubeQuotaState::default()),
        }
    }

    /// Select the enabled strategy with smallest `priority`, replace any
    /// currently active one, append `{action: activated}` to history.
    pub async fn activate(&self, platform: &str, reason: impl Into<String>) -> Option<FallbackStrategy> {
        let candidates = self.strategies.get(platform)?;
        let selected = candidates
            .iter()
            .filter(|s| s.enabled)
            .min_by_key(|s| s.priority)?
            .clone();

        let reason = reason.into();
        warn!(platform, mode = ?selected.mode, %reason, "activating fallback");

        let mut guard = self.state.write().await;
        let entry = guard.entry(platform.to_string()).or_default();
        entry.active_strategy = Some(selected.clone());
        entry.history.push(HistoryEntry {
            timestamp: Utc::now(),
            action: HistoryAction::Activated,
            reason,
            strategy: selected.clone(),
        });
        Some(selected)
    }

    /// Clear the active strategy, append `{action: deactivated}`.
    pub async fn deactivate(&self, platform: &str, reason: impl Into<String>) -> bool {
        let mut guard = self.state.write().await;
        let Some(entry) = guard.get_mut(platform) else {
            return false;
        };
        let Some(strategy) = entry.active_strategy.take() else {
            return false;
        };
        let reason = reason.into();
        info!(platform, mode = ?strategy.mode, %reason, "deactivating fallback");
        entry.history.push(HistoryEntry {
            timestamp: Utc::now(),
            action: HistoryAction::Deactivated,
            reason,
            strategy,
        });
        true
    }

    pub async fn active_mode(&self, platform: &str) -> Option<FallbackMode> {
        self.state.read().await.get(platform).and_then(|s| s.active_strategy.as_ref()).map(|s| s.mode)
    }

    /// Table-driven restriction check, ported from
    /// `should_use_fallback_for_operation`.
    pub async fn restricted(&self, platform: &str, operation: &str) -> (bool, Option<String>) {
        let guard = self.state.read().await;
        let Some(strategy) = guard.get(platform).and_then(|s| s.active_strategy.as_ref()) else {
            return (false, None);
        };
        strategy.mode.restricts(operation)
    }

    /// User-facing status messages for the active mode.
    pub async fn recommendations(&self, platform: &str) -> Vec<String> {
        let guard = self.state.read().await;
        match guard.get(platform).and_then(|s| s.active_strategy.as_ref()) {
            Some(strategy) => strategy.mode.recommendations(platform),
            None => Vec::new(),
        }
    }

    pub async fn report(&self) -> FallbackReport {
        FallbackReport {
            platforms: self.state.read().await.clone(),
        }
    }

    pub async fn clear_history(&self, platform: Option<&str>) {
        let mut guard = self.state.write().await;
        match platform {
            Some(p) => {
                if let Some(entry) = guard.get_mut(p) {
                    entry.history.clear();
                }
            }
            None => {
                for entry in guard.values_mut() {
                    entry.history.clear();
                }
            }
        }
    }

    /// Record actual YouTube Data API unit consumption (e.g. 100 units for a
    /// `search.list` call). The first call of a new day starts the
    /// next-midnight-UTC reset clock, mirroring `update_youtube_quota`.
    pub async fn record_youtube_quota_usage(&self, units: u64, cookies_healthy: bool) {
        let mut q = self.youtube_quota.write().await;
        if q.reset_at.is_none() {
            q.reset_at = Some(next_utc_midnight(Utc::now()));
        }
        q.units_used += units;
        q.cookies_healthy = cookies_healthy;
    }

    /// A quota-exceeded (403 `quotaExceeded`) response: bump the error
    /// counters and treat the day's budget as exhausted regardless of our
    /// local unit tally, then immediately recompute and switch mode.
    pub async fn note_youtube_quota_exceeded(&self, cookies_healthy: bool) {
        {
            let mut q = self.youtube_quota.write().await;
            if q.reset_at.is_none() {
                q.reset_at = Some(next_utc_midnight(Utc::now()));
            }
            q.api_errors += 1;
            q.total_errors += 1;
            q.cookies_healthy = cookies_healthy;
            q.units_used = q.units_used.max(YOUTUBE_QUOTA_LIMIT);
        }
        self.apply_recommended_youtube_mode("quota exceeded").await;
    }

    /// If the day's reset time has passed, zero the counters — ported from
    /// the `datetime.now() > youtube_quota_reset_time` branch of
    /// `can_recover_to_api`.
    async fn maybe_reset_quota(&self) -> bool {
        let mut q = self.youtube_quota.write().await;
        match q.reset_at {
            Some(reset_at) if Utc::now() > reset_at => {
                *q = YoutubeQuotaState::default();
                info!("youtube quota reset, cleared error metrics");
                true
            }
            _ => false,
        }
    }

    /// Port of `get_youtube_strategy`: quota-fraction thresholds first, then
    /// the sustained-error fallbacks, defaulting to full API access.
    async fn recommended_youtube_mode(&self) -> FallbackMode {
        self.maybe_reset_quota().await;
        let q = *self.youtube_quota.read().await;
        let quota_fraction = q.units_used as f64 / YOUTUBE_QUOTA_LIMIT as f64;

        if quota_fraction >= 0.95 {
            if q.cookies_healthy {
                FallbackMode::YtdlpAuthenticated
            } else {
                FallbackMode::CacheOnly
            }
        } else if quota_fraction >= self.quota_conservation_threshold {
            if q.cookies_healthy {
                FallbackMode::YtdlpAuthenticated
            } else {
                FallbackMode::YtdlpPublic
            }
        } else if q.api_errors > 10 && q.cookies_healthy {
            FallbackMode::YtdlpAuthenticated
        } else if q.total_errors > 20 {
            FallbackMode::CacheOnly
        } else {
            FallbackMode::ApiPrimary
        }
    }

    /// Recompute the recommended YouTube mode and switch if it differs from
    /// what's active; `ApiPrimary` deactivates fallback entirely rather than
    /// forcing a strategy, since it's the unrestricted default.
    pub async fn apply_recommended_youtube_mode(&self, reason: &str) -> Option<FallbackMode> {
        let recommended = self.recommended_youtube_mode().await;
        let current = self.active_mode("youtube").await;
        if current == Some(recommended) || (current.is_none() && recommended == FallbackMode::ApiPrimary) {
            return None;
        }
        if recommended == FallbackMode::ApiPrimary {
            self.deactivate("youtube", reason.to_string()).await;
        } else {
            self.force_mode("youtube", recommended, reason.to_string()).await;
        }
        Some(recommended)
    }

    async fn force_mode(&self, platform: &str, mode: FallbackMode, reason: String) {
        let Some(candidates) = self.strategies.get(platform) else {
            return;
        };
        let Some(selected) = candidates.iter().find(|s| s.mode == mode).cloned() else {
            return;
        };
        warn!(platform, ?mode, %reason, "escalating fallback mode");
        let mut guard = self.state.write().await;
        let entry = guard.entry(platform.to_string()).or_default();
        entry.active_strategy = Some(selected.clone());
        entry.history.push(HistoryEntry {
            timestamp: Utc::now(),
            action: HistoryAction::Activated,
            reason,
            strategy: selected,
        });
    }

    /// Monitoring loop: every `retry_interval`, for the API-gated platform,
    /// recompute the best mode and switch if different. Cancels cleanly on
    /// `cancellation_token` via the usual `select!`-over-interval pattern.
    pub async fn run_monitor(&self, cancellation_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.retry_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Some(mode) = self.apply_recommended_youtube_mode("periodic quota recompute").await {
                        info!(?mode, "fallback monitor switched youtube mode");
                    }
                }
                _ = cancellation_token.cancelled() => {
                    info!("fallback monitor stopping");
                    break;
                }
            }
        }
    }
}

impl Default for FallbackEngine {
    fn default() -> Self {
        Self::new()
    }
}
