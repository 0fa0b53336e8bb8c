//! In-memory cookie storage.

use cookie_store::RawCookie;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use url::Url;

/// Cookie storage following RFC 6265 matching rules.
///
/// `Domain`, `Path`, `Secure`, `Expires` and `Max-Age` are honored when
/// cookies are stored and when they are selected for a request.
///
/// Access is serialized by an internal lock that is only held for the
/// duration of a single read or write, never across a network call.
/// Cloning a jar produces an independent copy of its cookies.
#[derive(Debug, Default)]
pub struct CookieJar {
    store: RwLock<cookie_store::CookieStore>,
}

impl CookieJar {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a `Set-Cookie` style string as if `url` had sent it.
    pub fn add_cookie_str(&self, cookie: &str, url: &Url) {
        match RawCookie::parse(cookie) {
            Ok(cookie) => self
                .write()
                .store_response_cookies(std::iter::once(cookie.into_owned()), url),
            Err(e) => tracing::trace!(url = %url, error = %e, "ignoring unparseable cookie"),
        }
    }

    /// Value of the named cookie that would be sent with a request to `url`.
    pub fn get(&self, url: &Url, name: &str) -> Option<String> {
        self.read()
            .get_request_values(url)
            .find(|(cookie_name, _)| *cookie_name == name)
            .map(|(_, value)| value.to_string())
    }

    /// Number of unexpired cookies across all domains.
    pub fn len(&self) -> usize {
        self.read().iter_unexpired().count()
    }

    /// Whether the jar holds no unexpired cookies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every cookie.
    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, cookie_store::CookieStore> {
        // The store stays consistent even if a writer panicked.
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, cookie_store::CookieStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for CookieJar {
    fn clone(&self) -> Self {
        Self {
            store: RwLock::new(self.read().clone()),
        }
    }
}

impl CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let cookies = cookie_headers
            .filter_map(|header| header.to_str().ok())
            .filter_map(|header| match RawCookie::parse(header) {
                Ok(cookie) => Some(cookie.into_owned()),
                Err(e) => {
                    tracing::trace!(url = %url, error = %e, "ignoring unparseable Set-Cookie header");
                    None
                }
            })
            // Collected so the lock is not held while parsing.
            .collect::<Vec<_>>();

        self.write().store_response_cookies(cookies.into_iter(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .read()
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn set(jar: &CookieJar, target: &str, headers: &[&str]) {
        let values: Vec<HeaderValue> = headers.iter().map(|h| HeaderValue::from_str(h).unwrap()).collect();
        jar.set_cookies(&mut values.iter(), &url(target));
    }

    fn sent(jar: &CookieJar, target: &str) -> Option<String> {
        jar.cookies(&url(target)).map(|h| h.to_str().unwrap().to_string())
    }

    #[test]
    fn test_set_and_send_cookies() {
        let jar = CookieJar::new();
        set(&jar, "http://example.com/login", &["session=abc; Path=/; HttpOnly", "theme=dark"]);

        assert_eq!(jar.len(), 2);
        assert_eq!(jar.get(&url("http://example.com/"), "session").as_deref(), Some("abc"));

        let header = sent(&jar, "http://example.com/account").unwrap();
        let mut pairs: Vec<&str> = header.split("; ").collect();
        pairs.sort_unstable();
        assert_eq!(pairs, ["session=abc", "theme=dark"]);
    }

    #[test]
    fn test_host_only_cookie_scoped_to_host() {
        let jar = CookieJar::new();
        jar.add_cookie_str("a=1", &url("http://example.com/"));

        assert!(sent(&jar, "http://other.example/").is_none());
        assert!(sent(&jar, "http://api.example.com/").is_none());
    }

    #[test]
    fn test_domain_cookie_sent_to_sibling_subdomain() {
        let jar = CookieJar::new();
        set(&jar, "http://www.example.com/", &["sid=1; Domain=example.com"]);

        assert_eq!(sent(&jar, "http://api.example.com/").as_deref(), Some("sid=1"));
        assert_eq!(sent(&jar, "http://example.com/").as_deref(), Some("sid=1"));
        assert!(sent(&jar, "http://example.org/").is_none());
    }

    #[test]
    fn test_secure_cookie_not_sent_over_http() {
        let jar = CookieJar::new();
        set(&jar, "https://example.com/", &["sid=secret; Secure"]);

        assert!(sent(&jar, "http://example.com/").is_none());
        assert_eq!(sent(&jar, "https://example.com/").as_deref(), Some("sid=secret"));
    }

    #[test]
    fn test_path_scoping() {
        let jar = CookieJar::new();
        set(&jar, "http://example.com/", &["pref=admin; Path=/admin", "pref=root; Path=/"]);

        assert_eq!(jar.len(), 2);
        assert_eq!(sent(&jar, "http://example.com/").as_deref(), Some("pref=root"));

        let admin = sent(&jar, "http://example.com/admin/users").unwrap();
        assert!(admin.contains("pref=admin"));
        assert!(admin.contains("pref=root"));
    }

    #[test]
    fn test_expired_cookie_not_stored() {
        let jar = CookieJar::new();
        set(&jar, "http://example.com/", &["old=1; Expires=Thu, 01 Jan 1970 00:00:00 GMT"]);

        assert!(jar.is_empty());
        assert!(sent(&jar, "http://example.com/").is_none());
    }

    #[test]
    fn test_max_age_zero_removes_cookie() {
        let jar = CookieJar::new();
        set(&jar, "http://example.com/", &["session=abc"]);
        set(&jar, "http://example.com/", &["session=; Max-Age=0"]);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_unparseable_cookie_ignored() {
        let jar = CookieJar::new();
        set(&jar, "http://example.com/", &["garbage", "=nameless"]);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_clear() {
        let jar = CookieJar::new();
        jar.add_cookie_str("a=1", &url("http://example.com/"));
        jar.clear();
        assert!(jar.is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let origin = url("http://example.com/");
        let jar = CookieJar::new();
        jar.add_cookie_str("a=1", &origin);

        let copy = jar.clone();
        copy.add_cookie_str("b=2", &origin);
        jar.add_cookie_str("a=; Max-Age=0", &origin);

        assert_eq!(jar.len(), 0);
        assert_eq!(copy.len(), 2);
        assert_eq!(copy.get(&origin, "a").as_deref(), Some("1"));
    }
}
