//! Target URL normalisation and the coarse host guard for the media proxy.

use super::MediaCacheError;
use reqwest::Url;

/// Build the target URL from the path captured after `/proxy/`.
///
/// Accepts `https://host/p`, `https:/host/p` (slashes collapsed by a client or
/// proxy) and the scheme-folded `https/host/p`. A non-empty `query` is appended.
pub fn normalize_target_url(raw: &str, query: Option<&str>) -> Result<Url, MediaCacheError> {
    let raw = raw.trim_start_matches('/');

    let mut target = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else if let Some(rest) = raw
        .strip_prefix("http:/")
        .map(|rest| ("http", rest))
        .or_else(|| raw.strip_prefix("https:/").map(|rest| ("https", rest)))
        .map(|(scheme, rest)| format!("{}://{}", scheme, rest))
    {
        rest
    } else {
        raw.replacen('/', "://", 1)
    };

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(query);
    }

    let url = Url::parse(&target)
        .map_err(|e| MediaCacheError::InvalidUrl(format!("{}: {}", target, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(MediaCacheError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(MediaCacheError::InvalidUrl(format!("{} has no host", target)));
    }
    Ok(url)
}

/// Reject loopback and private-range hosts.
///
/// This is a prefix match on the literal host, not a CIDR-aware check: names
/// that resolve to private addresses and ranges such as 169.254.0.0/16 pass.
pub fn check_host(url: &Url, allow_private_hosts: bool) -> Result<(), MediaCacheError> {
    if allow_private_hosts {
        return Ok(());
    }
    let host = url
        .host_str()
        .unwrap_or_default()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_lowercase();

    if host == "localhost"
        || host == "127.0.0.1"
        || host == "::1"
        || host.starts_with("10.")
        || host.starts_with("192.168.")
        || host.starts_with("172.")
    {
        return Err(MediaCacheError::BlockedHost(host));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accepts_all_forms() {
        let expected = "https://i.example.com/a/b.png";
        for raw in [
            "https://i.example.com/a/b.png",
            "/https://i.example.com/a/b.png",
            "https:/i.example.com/a/b.png",
            "https/i.example.com/a/b.png",
        ] {
            assert_eq!(normalize_target_url(raw, None).unwrap().as_str(), expected);
        }
    }

    #[test]
    fn test_normalize_appends_query() {
        let url = normalize_target_url("http/cdn.example.com/img.jpg", Some("w=100&h=50")).unwrap();
        assert_eq!(url.as_str(), "http://cdn.example.com/img.jpg?w=100&h=50");
        let url = normalize_target_url("http/cdn.example.com/img.jpg", Some("")).unwrap();
        assert_eq!(url.as_str(), "http://cdn.example.com/img.jpg");
    }

    #[test]
    fn test_normalize_rejects_other_schemes() {
        assert!(matches!(
            normalize_target_url("ftp/example.com/file", None),
            Err(MediaCacheError::InvalidUrl(_))
        ));
        assert!(normalize_target_url("file:///etc/passwd", None).is_err());
        assert!(normalize_target_url("not a url", None).is_err());
    }

    #[test]
    fn test_check_host_blocks_private_prefixes() {
        for raw in [
            "http://127.0.0.1/x",
            "http://192.168.1.5/y",
            "http://localhost:8080/z",
            "http://10.0.0.1/",
            "http://172.16.0.1/",
            "http://[::1]/",
        ] {
            let url = Url::parse(raw).unwrap();
            assert!(
                matches!(check_host(&url, false), Err(MediaCacheError::BlockedHost(_))),
                "{} should be blocked",
                raw
            );
            assert!(check_host(&url, true).is_ok());
        }
        let url = Url::parse("https://i.example.com/a.png").unwrap();
        assert!(check_host(&url, false).is_ok());
    }
}
