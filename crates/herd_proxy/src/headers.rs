use std::collections::HashSet;

use http::header::{ACCEPT_ENCODING, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, HOST};
use http::{HeaderMap, HeaderValue};

/// =======================================================
/// HEADER REWRITE (proxy semantics)
/// =======================================================
///
/// Hop-by-hop and transfer-framing headers. They describe a single
/// connection, never the resource, so they are not forwarded in either
/// direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Headers for the outbound request.
///
/// - Copies every inbound header (all values, in order)
/// - Drops `Host`: the client derives it from the upstream URL
/// - Drops `Content-Length`: the client sets it for the buffered body
/// - Drops hop-by-hop / framing headers, and any header named in `Connection`
/// - Forces `Accept-Encoding: gzip` so compression handling is uniform
pub(crate) fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let connection_tokens = collect_connection_tokens(inbound);
    let mut out = HeaderMap::with_capacity(inbound.len() + 1);

    for (name, value) in inbound {
        if name == HOST
            || name == CONTENT_LENGTH
            || is_hop_by_hop(name.as_str(), &connection_tokens)
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    out.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
    out
}

/// Headers stored with a cache entry.
///
/// The body is stored decoded, so `Content-Encoding` would lie; hop-by-hop
/// headers are dropped for the same reasons as on the way out.
/// `Content-Length` is kept: it only changes when the body was decoded, and
/// the fetcher removes it in that case.
pub(crate) fn cacheable_headers(mut upstream: HeaderMap) -> HeaderMap {
    let connection_tokens = collect_connection_tokens(&upstream);

    upstream.remove(CONTENT_ENCODING);
    for name in HOP_BY_HOP {
        upstream.remove(*name);
    }
    for token in &connection_tokens {
        upstream.remove(token.as_str());
    }

    upstream
}

fn is_hop_by_hop(name: &str, connection_tokens: &HashSet<String>) -> bool {
    HOP_BY_HOP.contains(&name) || connection_tokens.contains(name)
}

fn collect_connection_tokens(headers: &HeaderMap) -> HashSet<String> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(split_header_tokens)
        .collect()
}

fn split_header_tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split(',').filter_map(|token| {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(
                trimmed
                    .trim_matches(|c| c == '"' || c == '\'')
                    .to_ascii_lowercase(),
            )
        }
    })
}
