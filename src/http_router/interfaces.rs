//! Split-tunnel routing configuration
//!
//! Ported from the original's `RoutingConfig`/`NetworkInterfaceDetector`
//! (`network_routing.py`): a strategy plus a per-service VPN toggle map,
//! loaded from environment variables (§6), and real interface enumeration
//! via `pnet_datalink` classified with the same `wg`/`tun`/`vpn`/`proton`
//! name-prefix heuristic as `_classify_interfaces`.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::models::ServiceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStrategy {
    Auto,
    VpnOnly,
    DirectOnly,
    SplitTunnel,
}

impl NetworkStrategy {
    fn from_env_value(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "vpn_only" => NetworkStrategy::VpnOnly,
            "direct_only" => NetworkStrategy::DirectOnly,
            "split_tunnel" => NetworkStrategy::SplitTunnel,
            _ => NetworkStrategy::Auto,
        }
    }
}

/// A detected local network interface. `ip_address` is retained so the
/// router can actually bind outgoing sockets to it (mirrors the original's
/// `NetworkInterface.ip_address`, passed into `aiohttp.TCPConnector` as
/// `local_addr`; here it becomes `ClientBuilder::local_address`).
#[derive(Debug, Clone)]
pub struct NetworkInterface {
    pub name: String,
    pub ip_address: Option<IpAddr>,
    pub is_vpn: bool,
    pub is_default: bool,
}

/// Name-prefix indicators the original's `_classify_interfaces` checks
/// (`vpn_indicators = ["wg", "tun", "vpn", "proton"]`), plus its special
/// case for the Docker VPN bridge subnet (`172.28.x.x`).
fn looks_like_vpn(name: &str, ips: &[IpAddr]) -> bool {
    const VPN_INDICATORS: [&str; 4] = ["wg", "tun", "vpn", "proton"];
    let lower = name.to_lowercase();
    if VPN_INDICATORS.iter().any(|indicator| lower.contains(indicator)) {
        return true;
    }
    ips.iter().any(|ip| ip.to_string().starts_with("172.28."))
}

/// Enumerate non-loopback, up interfaces on the host and classify each as
/// VPN or direct; the first direct interface found is marked default. Ported
/// from `NetworkInterfaceDetector.detect_interfaces`/`_classify_interfaces`.
pub fn detect_interfaces() -> Vec<NetworkInterface> {
    let mut interfaces: Vec<NetworkInterface> = pnet_datalink::interfaces()
        .into_iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .map(|iface| {
            let ips: Vec<IpAddr> = iface.ips.iter().map(|net| net.ip()).collect();
            let ip_address = ips.iter().find(|ip| ip.is_ipv4()).or_else(|| ips.first()).copied();
            NetworkInterface {
                is_vpn: looks_like_vpn(&iface.name, &ips),
                name: iface.name,
                ip_address,
                is_default: false,
            }
        })
        .collect();

    if let Some(direct) = interfaces.iter_mut().find(|iface| !iface.is_vpn) {
        direct.is_default = true;
    }
    interfaces
}

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub strategy: NetworkStrategy,
    service_routing: HashMap<ServiceType, bool>,
    pub vpn_interface: Option<String>,
    pub direct_interface: Option<String>,
    known_interfaces: Vec<String>,
    interface_ips: HashMap<String, IpAddr>,
}

impl RoutingConfig {
    /// Load routing config from environment variables, mirroring the
    /// original's env-var set: `NETWORK_STRATEGY`, `{SERVICE}_USE_VPN`,
    /// `VPN_INTERFACE`, `DEFAULT_INTERFACE`. `"auto"` (or unset) for either
    /// interface name falls through to real interface detection and
    /// classification (`_find_vpn_interface`/`_find_direct_interface`).
    pub fn from_env() -> Self {
        let strategy = std::env::var("NETWORK_STRATEGY")
            .map(|v| NetworkStrategy::from_env_value(&v))
            .unwrap_or(NetworkStrategy::Auto);

        let mut service_routing = HashMap::new();
        for (service, env_var) in [
            (ServiceType::Discord, "DISCORD_USE_VPN"),
            (ServiceType::Youtube, "YOUTUBE_USE_VPN"),
            (ServiceType::Rumble, "RUMBLE_USE_VPN"),
            (ServiceType::Odysee, "ODYSEE_USE_VPN"),
            (ServiceType::Peertube, "PEERTUBE_USE_VPN"),
        ] {
            service_routing.insert(service, Self::bool_env(env_var));
        }

        let detected = detect_interfaces();

        let configured_vpn = std::env::var("VPN_INTERFACE").ok().filter(|v| v != "auto");
        let configured_direct = std::env::var("DEFAULT_INTERFACE").ok().filter(|v| v != "auto");

        let vpn_interface = configured_vpn.or_else(|| detected.iter().find(|i| i.is_vpn).map(|i| i.name.clone()));
        let direct_interface = configured_direct
            .or_else(|| detected.iter().find(|i| i.is_default).map(|i| i.name.clone()))
            .or_else(|| detected.iter().find(|i| !i.is_vpn).map(|i| i.name.clone()));

        let mut known_interfaces: Vec<String> = detected.iter().map(|i| i.name.clone()).collect();
        known_interfaces.extend(vpn_interface.clone());
        known_interfaces.extend(direct_interface.clone());
        known_interfaces.sort();
        known_interfaces.dedup();

        let interface_ips: HashMap<String, IpAddr> = detected
            .iter()
            .filter_map(|i| i.ip_address.map(|ip| (i.name.clone(), ip)))
            .collect();

        Self {
            strategy,
            service_routing,
            vpn_interface,
            direct_interface,
            known_interfaces,
            interface_ips,
        }
    }

    fn bool_env(name: &str) -> bool {
        std::env::var(name)
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
            .unwrap_or(false)
    }

    /// Resolve which interface name, if any, `service` should bind to.
    pub fn interface_for(&self, service: ServiceType) -> Option<String> {
        match self.strategy {
            NetworkStrategy::DirectOnly => self.direct_interface.clone(),
            NetworkStrategy::VpnOnly => self.vpn_interface.clone(),
            NetworkStrategy::Auto | NetworkStrategy::SplitTunnel => {
                if *self.service_routing.get(&service).unwrap_or(&false) {
                    self.vpn_interface.clone()
                } else {
                    self.direct_interface.clone()
                }
            }
        }
    }

    /// A missing VPN interface MUST NOT block requests (§4.A); callers treat
    /// `false` as "fall back to default, log a warning".
    pub fn interface_exists(&self, name: &str) -> bool {
        name != "auto" && self.known_interfaces.iter().any(|n| n == name)
    }

    /// The local IP address bound to interface `name`, if it was detected
    /// with one. `HttpRouter::build_session` passes this into
    /// `ClientBuilder::local_address` to actually bind outgoing connections.
    pub fn ip_for_interface(&self, name: &str) -> Option<IpAddr> {
        self.interface_ips.get(name).copied()
    }

    /// Per-service VPN toggle, for the `routing_info()` report (§6).
    pub fn service_uses_vpn(&self, service: ServiceType) -> bool {
        *self.service_routing.get(&service).unwrap_or(&false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_only_ignores_service_routing() {
        let config = RoutingConfig {
            strategy: NetworkStrategy::DirectOnly,
            service_routing: HashMap::from([(ServiceType::Discord, true)]),
            vpn_interface: Some("wg0".into()),
            direct_interface: Some("eth0".into()),
            known_interfaces: vec!["wg0".into(), "eth0".into()],
            interface_ips: HashMap::new(),
        };
        assert_eq!(config.interface_for(ServiceType::Discord), Some("eth0".into()));
    }

    #[test]
    fn split_tunnel_honors_per_service_toggle() {
        let config = RoutingConfig {
            strategy: NetworkStrategy::SplitTunnel,
            service_routing: HashMap::from([(ServiceType::Discord, true), (ServiceType::Youtube, false)]),
            vpn_interface: Some("wg0".into()),
            direct_interface: Some("eth0".into()),
            known_interfaces: vec!["wg0".into(), "eth0".into()],
            interface_ips: HashMap::new(),
        };
        assert_eq!(config.interface_for(ServiceType::Discord), Some("wg0".into()));
        assert_eq!(config.interface_for(ServiceType::Youtube), Some("eth0".into()));
    }

    #[test]
    fn name_prefixes_classify_as_vpn() {
        assert!(looks_like_vpn("wg0", &[]));
        assert!(looks_like_vpn("tun0", &[]));
        assert!(looks_like_vpn("protonvpn0", &[]));
        assert!(!looks_like_vpn("eth0", &[]));
    }

    #[test]
    fn docker_vpn_subnet_classifies_as_vpn_even_with_plain_name() {
        let vpn_ip: IpAddr = "172.28.5.2".parse().unwrap();
        assert!(looks_like_vpn("eth1", &[vpn_ip]));
        let direct_ip: IpAddr = "192.168.1.5".parse().unwrap();
        assert!(!looks_like_vpn("eth1", &[direct_ip]));
    }

    #[test]
    fn ip_for_interface_resolves_known_names_and_none_otherwise() {
        let config = RoutingConfig {
            strategy: NetworkStrategy::SplitTunnel,
            service_routing: HashMap::new(),
            vpn_interface: Some("wg0".into()),
            direct_interface: Some("eth0".into()),
            known_interfaces: vec!["wg0".into(), "eth0".into()],
            interface_ips: HashMap::from([("eth0".to_string(), "192.168.1.5".parse().unwrap())]),
        };
        assert_eq!(config.ip_for_interface("eth0"), Some("192.168.1.5".parse().unwrap()));
        assert_eq!(config.ip_for_interface("wg0"), None);
    }
}
