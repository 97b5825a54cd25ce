//! Private-network guard for outbound fetches.

use async_trait::async_trait;
use reqwest::Url;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use super::error::FetchError;

/// Resolves a hostname to the addresses a connection could reach.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system.
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Whether an address belongs to a range the fetcher must never contact.
///
/// IPv6 addresses that carry an IPv4 address (mapped, compatible, NAT64)
/// are judged by the embedded IPv4 address.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => match embedded_v4(v6) {
            Some(v4) => is_blocked_v4(v4),
            None => is_blocked_v6(v6),
        },
    }
}

fn embedded_v4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }
    let segments = ip.segments();
    let tail = Ipv4Addr::from(((segments[6] as u32) << 16) | segments[7] as u32);
    match segments {
        // 64:ff9b::/96 NAT64 well-known prefix
        [0x64, 0xff9b, 0, 0, 0, 0, ..] => Some(tail),
        // ::a.b.c.d IPv4-compatible; :: and ::1 stay IPv6
        [0, 0, 0, 0, 0, 0, ..] if !ip.is_loopback() && !ip.is_unspecified() => Some(tail),
        _ => None,
    }
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 0.0.0.0/8
        || a == 0
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (b & 0xc0) == 64)
}

fn is_blocked_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}

fn is_blocked_hostname(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == "localhost" || host.ends_with(".localhost") || host.ends_with(".local")
}

/// Validates fetch targets before any request is sent to them.
#[derive(Clone)]
pub struct NetworkGuard {
    resolver: Arc<dyn HostResolver>,
    allow_private: bool,
}

impl NetworkGuard {
    pub fn new(resolver: Arc<dyn HostResolver>, allow_private: bool) -> Self {
        Self {
            resolver,
            allow_private,
        }
    }

    /// Parses `raw` and checks it. Only http and https are accepted.
    pub async fn check_str(&self, raw: &str) -> Result<Url, FetchError> {
        let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        self.check(&url).await?;
        Ok(url)
    }

    /// Rejects `url` when its host is a local name, or when the literal
    /// address or any resolved address is private or reserved.
    pub async fn check(&self, url: &Url) -> Result<(), FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FetchError::InvalidUrl("URL has no host".to_string()))?;

        if self.allow_private {
            return Ok(());
        }

        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return if is_blocked_ip(ip) {
                Err(FetchError::blocked(host))
            } else {
                Ok(())
            };
        }

        if is_blocked_hostname(host) {
            return Err(FetchError::blocked(host));
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let addrs = self
            .resolver
            .resolve(host, port)
            .await
            .map_err(|e| FetchError::InvalidUrl(format!("cannot resolve {host}: {e}")))?;

        if addrs.is_empty() {
            return Err(FetchError::InvalidUrl(format!("{host} has no addresses")));
        }
        if let Some(ip) = addrs.iter().find(|ip| is_blocked_ip(**ip)) {
            tracing::warn!(host = %host, address = %ip, "Refusing fetch to private address");
            return Err(FetchError::blocked(host));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticResolver;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_blocked_ranges() {
        for addr in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
            "224.0.0.1",
            "255.255.255.255",
            "::1",
            "::",
            "fd00::1",
            "fe80::1",
            "ff02::1",
            "::ffff:10.0.0.1",
            "::ffff:127.0.0.1",
        ] {
            assert!(is_blocked_ip(ip(addr)), "{addr} should be blocked");
        }
    }

    #[test]
    fn test_embedded_ipv4_is_unwrapped() {
        for addr in ["64:ff9b::a00:1", "64:ff9b::7f00:1", "::a00:1", "::127.0.0.1", "::169.254.169.254"] {
            assert!(is_blocked_ip(ip(addr)), "{addr} should be blocked");
        }
        for addr in ["64:ff9b::808:808", "::8.8.8.8"] {
            assert!(!is_blocked_ip(ip(addr)), "{addr} should pass");
        }
        assert!(is_blocked_ip(ip("::1")));
        assert!(is_blocked_ip(ip("::")));
    }

    #[test]
    fn test_public_addresses_pass() {
        for addr in ["8.8.8.8", "93.184.216.34", "100.128.0.1", "2606:4700::1111", "::ffff:8.8.8.8"] {
            assert!(!is_blocked_ip(ip(addr)), "{addr} should pass");
        }
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let guard = NetworkGuard::new(Arc::new(StaticResolver::new()), false);
        let err = guard.check_str("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));

        let err = guard.check_str("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_local_names_are_blocked_without_lookup() {
        let resolver = Arc::new(StaticResolver::new());
        let guard = NetworkGuard::new(resolver.clone(), false);

        for url in ["http://localhost/", "http://api.localhost:8080/", "http://printer.local/"] {
            let err = guard.check_str(url).await.unwrap_err();
            assert!(matches!(err, FetchError::BlockedNetworkTarget { .. }), "{url}");
        }
        assert_eq!(resolver.lookups(), 0);
    }

    #[tokio::test]
    async fn test_literal_addresses() {
        let guard = NetworkGuard::new(Arc::new(StaticResolver::new()), false);

        for url in ["http://169.254.169.254/latest", "http://[::1]/", "http://[::ffff:a00:1]/", "http://2130706433/"] {
            let err = guard.check_str(url).await.unwrap_err();
            assert!(matches!(err, FetchError::BlockedNetworkTarget { .. }), "{url}");
        }
        assert!(guard.check_str("https://8.8.8.8/a.mp3").await.is_ok());
    }

    #[tokio::test]
    async fn test_any_private_resolution_blocks() {
        let resolver = StaticResolver::new()
            .with_host("mixed.example", vec![ip("93.184.216.34"), ip("10.0.0.5")])
            .with_host("cdn.example", vec![ip("93.184.216.34")]);
        let guard = NetworkGuard::new(Arc::new(resolver), false);

        let err = guard.check_str("https://mixed.example/a.mp4").await.unwrap_err();
        assert!(matches!(err, FetchError::BlockedNetworkTarget { .. }));
        assert!(guard.check_str("https://cdn.example/a.mp4").await.is_ok());
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_invalid() {
        let guard = NetworkGuard::new(Arc::new(StaticResolver::new()), false);
        let err = guard.check_str("https://nowhere.example/").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_allow_private_skips_checks() {
        let guard = NetworkGuard::new(Arc::new(StaticResolver::new()), true);
        assert!(guard.check_str("http://127.0.0.1:9000/a.mp3").await.is_ok());
        assert!(guard.check_str("ftp://127.0.0.1/").await.is_err());
    }
}
