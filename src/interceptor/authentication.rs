use crate::interceptor::{Interceptor, InterceptorResult, Next};
use crate::services::Authenticator;
use async_trait::async_trait;
use axum::{body::Body, http::Request};
use std::sync::Arc;

/// Attaches the [`Principal`](crate::services::Principal) of a logged in visitor
pub struct AuthenticationInterceptor {
    authenticator: Arc<Authenticator>,
}

impl AuthenticationInterceptor {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl Interceptor for AuthenticationInterceptor {
    async fn intercept(&self, mut request: Request<Body>, next: Next) -> InterceptorResult {
        if let Some(principal) = self.authenticator.authenticate(request.headers()) {
            tracing::debug!("Authenticated {} as {}", principal.name, principal.role);
            request.extensions_mut().insert(principal);
        }
        next.run(request).await
    }
}
