//! Declarative route filters
//!
//! A route lists its guards in a [`RouteFilters`]; the resulting
//! [`GuardLayer`] runs them in order before the handler. The first guard that
//! denies the request answers it.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

mod antiforgery;
mod captcha;
mod layer;
mod linkable;

pub use antiforgery::ValidateAntiforgeryToken;
pub use captcha::ValidateFormCaptcha;
pub use layer::{GuardLayer, GuardMiddleware};
pub use linkable::EnsureLinkable;

/// `Ok(())` lets the request through
pub type GuardResult = Result<(), GuardError>;

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large")]
    PayloadTooLarge,
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        tracing::debug!("Request denied: {}", self);
        match self {
            // Left bare so the status page handler can render them.
            GuardError::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
            GuardError::Unauthorized(_) => StatusCode::UNAUTHORIZED.into_response(),
            GuardError::Forbidden(_) => StatusCode::FORBIDDEN.into_response(),
            GuardError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            GuardError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE.into_response(),
        }
    }
}

/// Decides whether a request may reach its handler.
///
/// Guards may add extensions to the request for the guards and handler after them.
#[async_trait]
pub trait Guard: Send + Sync + 'static {
    async fn can_activate(&self, request: &mut Request<Body>) -> GuardResult;
}

/// Whether unsafe requests on a route must carry an antiforgery token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AntiforgeryPolicy {
    #[default]
    Validate,
    Ignore,
}

/// The filters declared for one route
#[derive(Clone, Default)]
pub struct RouteFilters {
    guards: Vec<Arc<dyn Guard>>,
    antiforgery: AntiforgeryPolicy,
}

impl RouteFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(mut self, guard: impl Guard) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    pub fn antiforgery(mut self, policy: AntiforgeryPolicy) -> Self {
        self.antiforgery = policy;
        self
    }

    pub fn antiforgery_policy(&self) -> AntiforgeryPolicy {
        self.antiforgery
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Build the layer, antiforgery validation first when required
    pub fn into_layer(self, max_body_bytes: usize) -> GuardLayer {
        let mut guards: Vec<Arc<dyn Guard>> = Vec::with_capacity(self.guards.len() + 1);
        if self.antiforgery == AntiforgeryPolicy::Validate {
            guards.push(Arc::new(ValidateAntiforgeryToken::new()));
        }
        guards.extend(self.guards);
        GuardLayer::new(guards, max_body_bytes)
    }
}
