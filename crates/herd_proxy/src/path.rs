use http::Uri;

/// =======================================================
/// URL REWRITE: upstream base + inbound path
/// =======================================================
///
/// The configured base is prefixed verbatim to the inbound path, and the
/// query is re-attached only when it is non-empty:
///
///   base = http://backend:3000, GET /foo?x=1  ->  http://backend:3000/foo?x=1
///
/// No normalization is done: a base with a trailing '/' yields "//".
pub(crate) fn upstream_url(base: &str, inbound: &Uri) -> String {
    let path = inbound.path();
    let query = inbound.query().filter(|q| !q.is_empty());

    let mut url = String::with_capacity(
        base.len() + path.len() + query.map_or(0, |q| q.len() + 1),
    );
    url.push_str(base);
    url.push_str(path);
    if let Some(q) = query {
        url.push('?');
        url.push_str(q);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn appends_path() {
        assert_eq!(
            upstream_url("http://backend:3000", &uri("/foo")),
            "http://backend:3000/foo"
        );
    }

    #[test]
    fn appends_query_when_present() {
        assert_eq!(
            upstream_url("http://backend:3000", &uri("/items?id=2&sort=asc")),
            "http://backend:3000/items?id=2&sort=asc"
        );
    }

    #[test]
    fn drops_empty_query_marker() {
        assert_eq!(
            upstream_url("http://backend:3000", &uri("/items?")),
            "http://backend:3000/items"
        );
    }

    #[test]
    fn keeps_base_path_prefix() {
        assert_eq!(
            upstream_url("http://backend:3000/api", &uri("/users")),
            "http://backend:3000/api/users"
        );
    }

    #[test]
    fn absolute_form_uses_only_path_and_query() {
        assert_eq!(
            upstream_url("http://backend", &uri("http://proxy.local:8080/a?b=c")),
            "http://backend/a?b=c"
        );
    }
}
