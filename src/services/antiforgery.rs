use super::FormCollection;
use axum::http::{HeaderMap, HeaderValue, header};
use cookie::{Cookie, SameSite};
use uuid::Uuid;

pub const COOKIE_NAME: &str = "ew-xsrf";
pub const FORM_FIELD: &str = "__RequestVerificationToken";
pub const HEADER_NAME: &str = "x-xsrf-token";

/// Double-submit cookie tokens against cross-site request forgery
#[derive(Debug, Clone, Default)]
pub struct Antiforgery;

impl Antiforgery {
    pub fn new() -> Self {
        Self
    }

    pub fn issue(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn cookie_token(&self, headers: &HeaderMap) -> Option<String> {
        crate::request::cookie_value(headers, COOKIE_NAME)
    }

    /// Token sent with the request itself, header first, then form field
    pub fn request_token(&self, headers: &HeaderMap, form: Option<&FormCollection>) -> Option<String> {
        headers
            .get(HEADER_NAME)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| form.and_then(|f| f.get(FORM_FIELD)).map(str::to_string))
    }

    pub fn validate(&self, headers: &HeaderMap, form: Option<&FormCollection>) -> bool {
        match (self.cookie_token(headers), self.request_token(headers, form)) {
            (Some(cookie), Some(sent)) => !cookie.is_empty() && constant_time_eq(&cookie, &sent),
            _ => false,
        }
    }

    pub fn set_cookie(&self, token: &str) -> Option<HeaderValue> {
        let cookie = Cookie::build((COOKIE_NAME, token.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .build();
        HeaderValue::from_str(&cookie.to_string()).ok()
    }

    /// Insert the `Set-Cookie` header for a freshly issued token
    pub fn append_cookie(&self, headers: &mut HeaderMap, token: &str) {
        if let Some(value) = self.set_cookie(token) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}
