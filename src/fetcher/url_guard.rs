use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

use crate::fetcher::errors::FetchError;

/// Turns caller input into an absolute http(s) URL.
///
/// A missing scheme defaults to `https://`. Any scheme other than http or
/// https is rejected.
pub fn normalize_url(input: &str) -> Result<Url, FetchError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidUrl("empty url".to_string()));
    }

    let lowered = trimmed.to_ascii_lowercase();
    let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else if trimmed.contains("://") {
        return Err(FetchError::InvalidUrl(format!(
            "unsupported scheme in '{}'",
            trimmed
        )));
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    if url.host().is_none() {
        return Err(FetchError::InvalidUrl(format!("no host in '{}'", trimmed)));
    }
    Ok(url)
}

/// Rejects URLs resolving to loopback, private, or link-local hosts.
pub fn ensure_public_host(url: &Url) -> Result<(), FetchError> {
    let blocked = match url.host() {
        Some(Host::Domain(domain)) => is_internal_domain(domain),
        Some(Host::Ipv4(ip)) => is_internal_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_internal_ipv6(ip),
        None => true,
    };

    if blocked {
        return Err(FetchError::PrivateUrl(
            url.host_str().unwrap_or_default().to_string(),
        ));
    }
    Ok(())
}

fn is_internal_domain(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    domain == "localhost" || domain.ends_with(".localhost")
}

fn is_internal_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_internal_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_internal_ipv4(mapped);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fe80::/10 link-local
        || (first & 0xffc0) == 0xfe80
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
}
