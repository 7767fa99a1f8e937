pub mod health;
pub use self::health::health;

pub mod login;
pub use self::login::login;

pub mod refresh;
pub use self::refresh::refresh_token;

pub mod logout;
pub use self::logout::logout;

pub mod protected;
pub use self::protected::protected;

// common functions for the handlers
use axum::http::{header::COOKIE, HeaderMap};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Client IP from the usual proxy headers.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Value of the cookie `name`, if sent.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `HttpOnly` + `Secure` cookie living `max_age` seconds.
pub fn auth_cookie(name: &str, value: &str, max_age: u64) -> String {
    format!("{name}={value}; Max-Age={max_age}; Path=/; HttpOnly; Secure; SameSite=Strict")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extract_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("198.51.100.2"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.1 , 10.0.0.1"),
        );
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("203.0.113.1"));
    }

    #[test]
    fn extract_cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; refresh_token=abc.def.ghi; other=1"),
        );
        assert_eq!(
            extract_cookie(&headers, REFRESH_COOKIE).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(extract_cookie(&headers, ACCESS_COOKIE), None);
    }

    #[test]
    fn extract_cookie_ignores_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("refresh_token="));
        assert_eq!(extract_cookie(&headers, REFRESH_COOKIE), None);
    }

    #[test]
    fn auth_cookie_is_http_only() {
        let cookie = auth_cookie(ACCESS_COOKIE, "tok", 3600);
        assert_eq!(
            cookie,
            "access_token=tok; Max-Age=3600; Path=/; HttpOnly; Secure; SameSite=Strict"
        );
    }
}
