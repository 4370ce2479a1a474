//! Outbound address filtering for source downloads.
//!
//! Hosts are classified after `url` has normalized them, so decimal, hex,
//! userinfo-prefixed and IPv4-mapped spellings of an internal address are
//! caught the same way as the dotted form.

use std::error::Error;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use url::{Host, Url};

/// Hostnames that name the local machine or a cloud metadata service.
fn is_restricted_domain(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    domain == "localhost"
        || domain.ends_with(".localhost")
        || domain.starts_with("metadata.")
        || domain.ends_with(".internal")
}

fn is_restricted_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 0.0.0.0/8 "this network"
        || a == 0
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (b & 0xc0) == 64)
}

fn is_restricted_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_restricted_ipv4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}

/// Loopback, private, link-local, unspecified and mapped forms of those.
pub fn is_restricted_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_restricted_ipv4(v4),
        IpAddr::V6(v6) => is_restricted_ipv6(v6),
    }
}

/// Whether a parsed URL points at an internal or metadata host.
///
/// URLs without a host are treated as restricted.
pub fn is_restricted_url(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => is_restricted_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_restricted_ipv6(ip),
        Some(Host::Domain(domain)) => is_restricted_domain(domain),
        None => true,
    }
}

/// DNS resolver that drops restricted addresses, so a public name pointing
/// at an internal address cannot be used to reach it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublicResolver;

impl Resolve for PublicResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_public(name.as_str().to_string()))
    }
}

async fn resolve_public(host: String) -> Result<Addrs, Box<dyn Error + Send + Sync>> {
    let resolved: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
        .await?
        .filter(|addr| !is_restricted_ip(addr.ip()))
        .collect();

    if resolved.is_empty() {
        return Err(format!("{} does not resolve to a public address", host).into());
    }
    Ok(Box::new(resolved.into_iter()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn restricted(url: &str) -> bool {
        is_restricted_url(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_public_hosts_allowed() {
        assert!(!restricted("https://cdn.example.com/talk.mp4"));
        assert!(!restricted("http://93.184.216.34/video.mp4"));
        assert!(!restricted("http://[2606:2800:220:1::1]/video.mp4"));
        assert!(!restricted("http://100.128.0.1/video.mp4"));
    }

    #[test]
    fn test_alternate_spellings_of_internal_addresses() {
        for url in [
            "http://2130706433/video.mp4",
            "http://0x7f000001/video.mp4",
            "http://0177.0.0.1/video.mp4",
            "http://user@127.0.0.1/video.mp4",
            "http://x@169.254.169.254/latest/meta-data/",
            "http://[::ffff:127.0.0.1]/video.mp4",
            "http://[::ffff:a9fe:a9fe]/latest/meta-data/",
            "http://0/video.mp4",
        ] {
            assert!(restricted(url), "{url} should be restricted");
        }
    }

    #[test]
    fn test_internal_ranges() {
        for url in [
            "http://10.0.0.1/",
            "http://172.31.255.1/",
            "http://192.168.0.10/",
            "http://100.64.0.1/",
            "http://255.255.255.255/",
            "http://[::1]/",
            "http://[::]/",
            "http://[fd00::1]/",
            "http://[fe80::1]/",
        ] {
            assert!(restricted(url), "{url} should be restricted");
        }
    }

    #[test]
    fn test_restricted_names() {
        assert!(restricted("http://localhost:8000/"));
        assert!(restricted("http://LOCALHOST./"));
        assert!(restricted("http://api.localhost/"));
        assert!(restricted("http://metadata.google.internal/computeMetadata/v1/"));
        assert!(restricted("http://metadata.example.com/"));
        assert!(!restricted("http://localhost-videos.example.com/"));
    }

    #[tokio::test]
    async fn test_resolver_drops_loopback_answers() {
        let name = Name::from_str("localhost").unwrap();
        assert!(PublicResolver.resolve(name).await.is_err());
    }
}
