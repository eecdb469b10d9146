//! Settings domain resolution from page URLs

use crate::constants::settings::DEFAULT_DOMAIN;
use url::Url;

/// Registrable domain of `url`, or `"default"` when it cannot be determined.
///
/// Only http(s) URLs resolve. The domain is the last two labels of the host,
/// which is wrong for multi-label public suffixes: `www.example.co.uk`
/// resolves to `co.uk`. Resolving those properly needs a public suffix list.
pub fn resolve_domain(url: &str) -> String {
    host_of(url)
        .map(|host| registrable_part(&host))
        .unwrap_or_else(|| DEFAULT_DOMAIN.to_string())
}

fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    // Internationalized hosts come back punycoded and lowercased.
    let host = parsed.host_str()?;
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    if !host.starts_with('[') && host.split('.').any(str::is_empty) {
        return None;
    }
    Some(host.to_string())
}

fn registrable_part(host: &str) -> String {
    let labels: Vec<&str> = host.rsplit('.').take(2).collect();
    match labels.as_slice() {
        [tld, name] => format!("{}.{}", name, tld),
        _ => host.to_string(),
    }
}
