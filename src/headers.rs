//! Header merging and hop-by-hop filtering shared by the pool and gateway.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::str::FromStr;

/// Headers that must never cross a proxy hop in either direction.
const HOP_BY_HOP: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "content-encoding",
    "transfer-encoding",
];

/// Returns `true` if `name` is a hop-by-hop/framing header that must be stripped.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Build the outbound header map for a forwarded request.
///
/// Caller headers are applied first, in insertion order; endpoint-configured
/// headers are overlaid afterward and win on collision. Hop-by-hop headers
/// are stripped regardless of source.
pub fn merge_outbound(
    caller_headers: &HeaderMap,
    endpoint_headers: &HashMap<String, String>,
) -> HeaderMap {
    let mut out = HeaderMap::new();

    for (name, value) in caller_headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        out.insert(name.clone(), value.clone());
    }

    for (name, value) in endpoint_headers {
        if is_hop_by_hop(name) {
            continue;
        }
        let Ok(name) = HeaderName::from_str(name) else {
            continue;
        };
        let Ok(value) = HeaderValue::from_str(value) else {
            continue;
        };
        out.insert(name, value);
    }

    out
}

/// Strip hop-by-hop headers from a response before it is relayed to the caller.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        out.insert(name.clone(), value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_headers_win_on_collision() {
        let mut caller = HeaderMap::new();
        caller.insert("x-api-key", HeaderValue::from_static("caller-key"));
        caller.insert("accept", HeaderValue::from_static("application/json"));

        let mut endpoint = HashMap::new();
        endpoint.insert("x-api-key".to_string(), "endpoint-key".to_string());

        let merged = merge_outbound(&caller, &endpoint);
        assert_eq!(merged.get("x-api-key").unwrap(), "endpoint-key");
        assert_eq!(merged.get("accept").unwrap(), "application/json");
    }

    #[test]
    fn hop_by_hop_headers_are_stripped() {
        let mut caller = HeaderMap::new();
        caller.insert("host", HeaderValue::from_static("example.com"));
        caller.insert("connection", HeaderValue::from_static("keep-alive"));
        caller.insert("content-type", HeaderValue::from_static("application/json"));

        let merged = merge_outbound(&caller, &HashMap::new());
        assert!(merged.get("host").is_none());
        assert!(merged.get("connection").is_none());
        assert!(merged.get("content-type").is_some());
    }

    #[test]
    fn is_hop_by_hop_is_case_insensitive() {
        assert!(is_hop_by_hop("Content-Length"));
        assert!(is_hop_by_hop("TRANSFER-ENCODING"));
        assert!(!is_hop_by_hop("x-request-id"));
    }
}
