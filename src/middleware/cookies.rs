//! HttpOnly auth cookies.
//!
//! Browser clients get the token pair as cookies: `token` (user app) or
//! `admin_token` (admin console) for access, `refresh_token` for refresh.
//! API clients can ignore them and use the `Authorization` header.

use axum::http::{HeaderMap, HeaderValue, header::SET_COOKIE};
use chrono::Utc;

use crate::models::user::TokenPair;

pub const ACCESS_COOKIE: &str = "token";
pub const ADMIN_ACCESS_COOKIE: &str = "admin_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Builds `Set-Cookie` values for one login surface.
#[derive(Debug, Clone)]
pub struct AuthCookies {
    access_name: &'static str,
    secure: bool,
}

impl AuthCookies {
    pub fn user(secure: bool) -> Self {
        Self {
            access_name: ACCESS_COOKIE,
            secure,
        }
    }

    pub fn admin(secure: bool) -> Self {
        Self {
            access_name: ADMIN_ACCESS_COOKIE,
            secure,
        }
    }

    fn build(&self, name: &str, value: &str, max_age: i64) -> String {
        let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age}; HttpOnly");
        if self.secure {
            cookie.push_str("; Secure; SameSite=None");
        } else {
            cookie.push_str("; SameSite=Lax");
        }
        cookie
    }

    fn clear(&self, name: &str) -> String {
        self.build(name, "", 0) + "; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
    }

    /// Append both token cookies, each living as long as its token.
    pub fn set_tokens(&self, headers: &mut HeaderMap, tokens: &TokenPair) {
        let now = Utc::now();
        let access_age = (tokens.access_expires_at - now).num_seconds().max(0);
        let refresh_age = (tokens.refresh_expires_at - now).num_seconds().max(0);

        for cookie in [
            self.build(self.access_name, &tokens.access_token, access_age),
            self.build(REFRESH_COOKIE, &tokens.refresh_token, refresh_age),
        ] {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                headers.append(SET_COOKIE, value);
            }
        }
    }

    pub fn clear_tokens(&self, headers: &mut HeaderMap) {
        for cookie in [self.clear(self.access_name), self.clear(REFRESH_COOKIE)] {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                headers.append(SET_COOKIE, value);
            }
        }
    }
}

/// Value of cookie `name` from the `Cookie` header.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(axum::http::header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookie_header| {
            cookie_header.split(';').map(str::trim).find_map(|cookie| {
                let (cookie_name, value) = cookie.split_once('=')?;
                (cookie_name == name && !value.is_empty()).then_some(value)
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> TokenPair {
        let now = Utc::now();
        TokenPair {
            access_token: "acc".into(),
            refresh_token: "ref".into(),
            access_expires_at: now + chrono::Duration::minutes(60),
            refresh_expires_at: now + chrono::Duration::days(7),
        }
    }

    #[test]
    fn secure_cookies_are_cross_site() {
        let mut headers = HeaderMap::new();
        AuthCookies::admin(true).set_tokens(&mut headers, &pair());
        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("admin_token=acc; Path=/; Max-Age="));
        assert!(cookies[0].contains("HttpOnly; Secure; SameSite=None"));
        assert!(cookies[1].starts_with("refresh_token=ref;"));
    }

    #[test]
    fn clearing_expires_both() {
        let mut headers = HeaderMap::new();
        AuthCookies::user(false).clear_tokens(&mut headers);
        for value in headers.get_all(SET_COOKIE) {
            let value = value.to_str().unwrap();
            assert!(value.contains("Max-Age=0"));
            assert!(value.contains("SameSite=Lax"));
        }
    }

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc.def; refresh_token="),
        );
        assert_eq!(read_cookie(&headers, "token"), Some("abc.def"));
        assert_eq!(read_cookie(&headers, "refresh_token"), None);
        assert_eq!(read_cookie(&headers, "admin_token"), None);
    }
}
