//! A small cookie jar scoped by domain and path, attached to a [`Session`].
//!
//! No upstream source for this was available in `original_source/` (the
//! example pack's copy was filtered to zero files), so the shape follows
//! Crawlee's own documented `CookieJar` semantics rather than translating
//! any specific implementation: cookies are looked up by the most specific
//! matching `(domain, path)` pair.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieJar {
    // keyed by "domain|path|name" — a string key rather than a tuple so the
    // jar round-trips through `serde_json` (object keys must be strings) for
    // session-pool snapshot persistence (spec.md §4.2 `persistState`).
    cookies: HashMap<String, Cookie>,
}

fn cookie_key(domain: &str, path: &str, name: &str) -> String {
    format!("{domain}|{path}|{name}")
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, cookie: Cookie) {
        let key = cookie_key(&cookie.domain, &cookie.path, &cookie.name);
        self.cookies.insert(key, cookie);
    }

    /// Cookies applicable to `domain`/`path`: exact-or-parent domain match,
    /// path prefix match.
    pub fn cookies_for(&self, domain: &str, path: &str) -> Vec<&Cookie> {
        self.cookies
            .values()
            .filter(|c| domain_matches(&c.domain, domain) && path.starts_with(&c.path))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }
}

fn domain_matches(cookie_domain: &str, request_domain: &str) -> bool {
    request_domain == cookie_domain || request_domain.ends_with(&format!(".{cookie_domain}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomain_matches_parent_cookie_domain() {
        let mut jar = CookieJar::new();
        jar.set(Cookie {
            name: "session".into(),
            value: "abc".into(),
            domain: "example.com".into(),
            path: "/".into(),
        });
        assert_eq!(jar.cookies_for("www.example.com", "/").len(), 1);
        assert_eq!(jar.cookies_for("other.com", "/").len(), 0);
    }

    #[test]
    fn path_prefix_is_required() {
        let mut jar = CookieJar::new();
        jar.set(Cookie {
            name: "a".into(),
            value: "1".into(),
            domain: "example.com".into(),
            path: "/account".into(),
        });
        assert_eq!(jar.cookies_for("example.com", "/account/settings").len(), 1);
        assert_eq!(jar.cookies_for("example.com", "/other").len(), 0);
    }
}
