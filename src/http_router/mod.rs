//! Service-Scoped HTTP Router (§4.A)
//!
//! Lazy, per-service client construction keyed by a service name string.
//! Split-tunnel routing: `RoutingConfig` detects interfaces and applies
//! env-var-driven per-service VPN toggles.

mod interfaces;

pub use interfaces::{NetworkInterface, NetworkStrategy, RoutingConfig};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::ServiceType;

/// A pooled, reusable HTTP client bound to a chosen interface.
#[derive(Clone)]
pub struct Session {
    pub client: reqwest::Client,
    pub service: ServiceType,
    pub bound_interface: Option<String>,
}

/// Classifies a URL's host into a `ServiceType` via a fixed host-suffix table
/// (§6 platform URL classification).
pub fn classify_host(url: &str) -> ServiceType {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    if host.ends_with("youtube.com") || host.ends_with("youtu.be") {
        ServiceType::Youtube
    } else if host.ends_with("rumble.com") {
        ServiceType::Rumble
    } else if host.ends_with("odysee.com") {
        ServiceType::Odysee
    } else if host.ends_with("discord.com") || host.ends_with("discordapp.com") {
        ServiceType::Discord
    } else {
        // Federated instances have arbitrary hosts; callers that know they're
        // talking to a peertube instance should route explicitly rather than
        // rely on this fallback.
        ServiceType::Generic
    }
}

/// Hands out HTTP sessions tagged by service type, each pre-configured to
/// bind to a chosen network interface (direct vs VPN). Sessions are created
/// lazily per `(service, interface)` pair and pooled for reuse.
pub struct HttpRouter {
    routing: RoutingConfig,
    sessions: RwLock<HashMap<(ServiceType, Option<String>), Session>>,
    /// Shared DNS cache TTL (§4.A). reqwest has no dedicated DNS-cache-TTL
    /// knob, so this also bounds how long idle pooled connections are kept,
    /// the closest available proxy for "how long a resolved host stays warm".
    dns_cache_ttl: Duration,
    max_connections_per_host: usize,
}

impl HttpRouter {
    pub fn new(routing: RoutingConfig) -> Self {
        Self {
            routing,
            sessions: RwLock::new(HashMap::new()),
            dns_cache_ttl: Duration::from_secs(300),
            max_connections_per_host: 10,
        }
    }

    /// Return a pooled session for `service`, creating it on first use. Never
    /// fails: if the configured interface is unavailable, falls back to the
    /// default interface with a logged warning.
    pub async fn acquire(&self, service: ServiceType) -> Arc<Session> {
        let iface = self.routing.interface_for(service);
        let key = (service, iface.clone());

        if let Some(existing) = self.sessions.read().await.get(&key) {
            return Arc::new(existing.clone());
        }

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&key) {
            return Arc::new(existing.clone());
        }

        let session = self.build_session(service, iface);
        sessions.insert(key, session.clone());
        Arc::new(session)
    }

    /// Classify `url`'s host into a service and delegate to `acquire`.
    pub async fn acquire_for_url(&self, url: &str) -> Arc<Session> {
        self.acquire(classify_host(url)).await
    }

    /// The routing configuration this router was built with, for the
    /// Registry's `routing_info()` report (§6).
    pub fn routing(&self) -> &RoutingConfig {
        &self.routing
    }

    fn build_session(&self, service: ServiceType, iface: Option<String>) -> Session {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(self.max_connections_per_host)
            .pool_idle_timeout(self.dns_cache_ttl)
            .timeout(Duration::from_secs(30))
            .user_agent(format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));

        if service == ServiceType::Peertube {
            // The federation includes instances with self-signed certificates
            // (§4.E.3): TLS verification is disabled for this service class.
            builder = builder.danger_accept_invalid_certs(true);
        }

        let bound_interface = match &iface {
            Some(name) if self.routing.interface_exists(name) => {
                match self.routing.ip_for_interface(name) {
                    Some(ip) => {
                        debug!(?service, interface = %name, %ip, "binding session to interface");
                        builder = builder.local_address(ip);
                    }
                    None => {
                        warn!(?service, interface = %name, "interface known but has no bindable address, falling back to default");
                    }
                }
                Some(name.clone())
            }
            Some(name) => {
                warn!(?service, interface = %name, "configured interface unavailable, falling back to default");
                None
            }
            None => None,
        };

        Session {
            client: builder.build().unwrap_or_else(|_| reqwest::Client::new()),
            service,
            bound_interface,
        }
    }

    /// Close all pooled sessions. `reqwest::Client` releases sockets on drop,
    /// so this simply drops the pool; guaranteed on all exit paths since the
    /// caller holds no other references once this returns.
    pub async fn shutdown(&self) {
        self.sessions.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_hosts() {
        assert_eq!(classify_host("https://www.youtube.com/watch?v=x"), ServiceType::Youtube);
        assert_eq!(classify_host("https://rumble.com/v123-slug.html"), ServiceType::Rumble);
        assert_eq!(classify_host("https://odysee.com/@foo/bar"), ServiceType::Odysee);
        assert_eq!(classify_host("https://peertube.example.org/videos/watch/x"), ServiceType::Generic);
    }

    #[tokio::test]
    async fn acquire_is_idempotent_per_service() {
        let router = HttpRouter::new(RoutingConfig::from_env());
        let a = router.acquire(ServiceType::Youtube).await;
        let b = router.acquire(ServiceType::Youtube).await;
        assert_eq!(a.service, b.service);
    }

    #[tokio::test]
    async fn shutdown_clears_pool() {
        let router = HttpRouter::new(RoutingConfig::from_env());
        router.acquire(ServiceType::Youtube).await;
        router.shutdown().await;
        assert!(router.sessions.read().await.is_empty());
    }
}
