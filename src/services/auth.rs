use crate::config::SecurityOptions;
use axum::http::{HeaderMap, header};
use serde::Serialize;
use strum_macros::Display;

/// Cookie carrying a login token for browsers
pub const AUTH_COOKIE: &str = "ew-auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum Role {
    /// Site administrators using inline edit
    Admin,
    Member,
}

/// The authenticated user of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub name: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Token based login
///
/// Admin tokens are always accepted so administrators can edit the site even
/// when member login is disabled.
#[derive(Debug, Clone)]
pub struct Authenticator {
    admin_tokens: Vec<String>,
    member_tokens: Vec<String>,
    use_authentication: bool,
}

impl Authenticator {
    pub fn new(options: &SecurityOptions) -> Self {
        Self {
            admin_tokens: options.admin_tokens.clone(),
            member_tokens: options.member_tokens.clone(),
            use_authentication: options.use_authentication,
        }
    }

    /// Whether pages may require a member login
    pub fn site_authentication_enabled(&self) -> bool {
        self.use_authentication
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = bearer_token(headers)
            .or_else(|| crate::request::cookie_value(headers, AUTH_COOKIE))?;

        if let Some(index) = self.admin_tokens.iter().position(|t| *t == token) {
            return Some(Principal {
                name: format!("admin-{}", index + 1),
                role: Role::Admin,
            });
        }
        if self.use_authentication {
            if let Some(index) = self.member_tokens.iter().position(|t| *t == token) {
                return Some(Principal {
                    name: format!("member-{}", index + 1),
                    role: Role::Member,
                });
            }
        }
        None
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}
