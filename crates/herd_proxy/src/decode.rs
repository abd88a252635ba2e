use std::io::{self, Read};

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use http::HeaderMap;
use http::header::CONTENT_ENCODING;

/// `Content-Encoding` names exactly gzip (surrounding whitespace and case ignored).
pub(crate) fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"))
}

/// Decode a complete gzip body (all members).
///
/// An empty body is passed through: upstreams answer HEAD and 204/304 with
/// `Content-Encoding: gzip` and nothing to decode.
pub(crate) fn gunzip(raw: &[u8]) -> io::Result<Bytes> {
    if raw.is_empty() {
        return Ok(Bytes::new());
    }

    let mut out = Vec::with_capacity(raw.len().saturating_mul(4));
    MultiGzDecoder::new(raw).read_to_end(&mut out)?;
    Ok(Bytes::from(out))
}
