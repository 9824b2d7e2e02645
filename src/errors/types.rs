//! Error type definitions for the video broker core
//!
//! The taxonomy here intentionally mirrors the classification table used by
//! the Resilience Kernel (see `resilience::classify`): every error that can
//! come back from a source adapter collapses into one of the five surface
//! kinds callers actually see.

use thiserror::Error;

/// Internal classification used by the resilience kernel to decide
/// retry/circuit-breaker behavior. Never surfaced directly to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorCategory {
    Network,
    Timeout,
    RateLimit,
    Server5xx,
    Auth,
    NotFound,
    BadRequest,
    CircuitOpen,
    Unknown,
}

impl ErrorCategory {
    /// Categories the Resilience Kernel will retry.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::RateLimit
                | ErrorCategory::Server5xx
        )
    }

    /// Classify an HTTP status code per the §7 taxonomy table.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorCategory::Auth,
            404 | 410 => ErrorCategory::NotFound,
            429 => ErrorCategory::RateLimit,
            500..=599 => ErrorCategory::Server5xx,
            400..=499 => ErrorCategory::BadRequest,
            _ => ErrorCategory::Unknown,
        }
    }
}

/// The five surface kinds seen by the Registry and everything above it.
/// Every adapter-level error is classified then folded into one of these.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    /// Transient unavailability: network errors, timeouts, 5xx, exhausted
    /// circuit breakers, and federated sources where all instances failed.
    #[error("⚠️ {platform}: {message}")]
    Unavailable {
        platform: String,
        message: String,
        /// For the federated source: (failed, total) instance counts.
        instance_counts: Option<(usize, usize)>,
    },

    #[error("⏳ {platform}: rate limited - {message}")]
    RateLimited {
        platform: String,
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("🔒 {platform}: authentication required - {message}")]
    AuthRequired { platform: String, message: String },

    #[error("❌ {platform}: not found - {message}")]
    NotFound { platform: String, message: String },

    #[error("❌ {platform}: api error - {message}")]
    ApiError { platform: String, message: String },
}

impl PlatformError {
    pub fn platform(&self) -> &str {
        match self {
            PlatformError::Unavailable { platform, .. }
            | PlatformError::RateLimited { platform, .. }
            | PlatformError::AuthRequired { platform, .. }
            | PlatformError::NotFound { platform, .. }
            | PlatformError::ApiError { platform, .. } => platform,
        }
    }

    /// Best-effort reverse mapping back to a category, for callers (the
    /// Health Monitor, the Registry's cascade) that only have the surface
    /// error and need to feed the Prioritizer a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PlatformError::Unavailable { .. } => ErrorCategory::Network,
            PlatformError::RateLimited { .. } => ErrorCategory::RateLimit,
            PlatformError::AuthRequired { .. } => ErrorCategory::Auth,
            PlatformError::NotFound { .. } => ErrorCategory::NotFound,
            PlatformError::ApiError { .. } => ErrorCategory::Unknown,
        }
    }

    /// Build the surface error from a category + raw cause, per §7's
    /// propagation policy ("adapters catch and classify").
    pub fn from_category(
        category: ErrorCategory,
        platform: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let platform = platform.into();
        let message = message.into();
        match category {
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server5xx => {
                PlatformError::Unavailable {
                    platform,
                    message,
                    instance_counts: None,
                }
            }
            ErrorCategory::RateLimit => PlatformError::RateLimited {
                platform,
                message,
                retry_after_secs: None,
            },
            ErrorCategory::Auth => PlatformError::AuthRequired { platform, message },
            ErrorCategory::NotFound => PlatformError::NotFound { platform, message },
            ErrorCategory::CircuitOpen => PlatformError::Unavailable {
                platform,
                message: format!("circuit open: {message}"),
                instance_counts: None,
            },
            ErrorCategory::BadRequest | ErrorCategory::Unknown => {
                PlatformError::ApiError { platform, message }
            }
        }
    }
}

/// Convenience alias used throughout the broker.
pub type BrokerResult<T> = Result<T, PlatformError>;

/// Errors that flow through the Resilience Kernel's retry loop must be able
/// to classify themselves and to manufacture a timeout variant (needed when
/// a circuit breaker's own deadline fires before the operation returns any
/// concrete error).
pub trait Classify: Clone {
    fn category(&self) -> ErrorCategory;
    fn timeout() -> Self;
}

/// A lightweight transport-level error used by adapters before they have
/// enough context to build a full `PlatformError` (platform tag, etc).
#[derive(Debug, Clone)]
pub struct TransportError {
    pub category: ErrorCategory,
    pub message: String,
}

impl TransportError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let category = if err.is_timeout() {
            ErrorCategory::Timeout
        } else if let Some(status) = err.status() {
            ErrorCategory::from_status(status.as_u16())
        } else if err.is_connect() {
            ErrorCategory::Network
        } else {
            ErrorCategory::Unknown
        };
        Self::new(category, err.to_string())
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Classify for TransportError {
    fn category(&self) -> ErrorCategory {
        self.category
    }

    fn timeout() -> Self {
        Self::new(ErrorCategory::Timeout, "deadline exceeded")
    }
}
