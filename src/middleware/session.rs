//! Session cookies: the signed-in token and the guest cart token.

use axum::{
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use cookie::{time::Duration, Cookie, SameSite};

pub const AUTH_COOKIE: &str = "auth_token";
pub const GUEST_COOKIE: &str = "guest_session";

/// Guest carts outlive a browser session.
pub const GUEST_COOKIE_DAYS: i64 = 30;

pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
}

fn build_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> String {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
        .to_string()
}

pub fn auth_cookie(token: &str, ttl_hours: i64, secure: bool) -> String {
    build_cookie(AUTH_COOKIE, token.to_owned(), Duration::hours(ttl_hours), secure)
}

pub fn guest_cookie(token: &str, secure: bool) -> String {
    build_cookie(
        GUEST_COOKIE,
        token.to_owned(),
        Duration::days(GUEST_COOKIE_DAYS),
        secure,
    )
}

pub fn expired_cookie(name: &'static str, secure: bool) -> String {
    build_cookie(name, String::new(), Duration::ZERO, secure)
}

pub fn with_cookies<I>(mut response: Response, cookies: I) -> Response
where
    I: IntoIterator<Item = String>,
{
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => tracing::warn!(error = %err, "Dropped unencodable cookie"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; guest_session=abc-123; auth_token=t"),
        );
        assert_eq!(read_cookie(&headers, GUEST_COOKIE).as_deref(), Some("abc-123"));
        assert_eq!(read_cookie(&headers, AUTH_COOKIE).as_deref(), Some("t"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("auth_token="));
        assert_eq!(read_cookie(&headers, AUTH_COOKIE), None);
    }

    #[test]
    fn guest_cookie_is_http_only_and_scoped_to_root() {
        let cookie = guest_cookie("abc", false);
        assert!(cookie.starts_with("guest_session=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn expired_cookie_has_zero_max_age() {
        let cookie = expired_cookie(AUTH_COOKIE, true);
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("Secure"));
    }
}
