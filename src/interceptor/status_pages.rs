use crate::interceptor::{Interceptor, InterceptorResult, Next};
use crate::view::{ViewEngine, ViewScope};
use async_trait::async_trait;
use axum::{
    body::{Body, HttpBody},
    http::{Request, StatusCode},
    response::{Html, IntoResponse},
};
use std::sync::Arc;

const HANDLED: [StatusCode; 3] = [
    StatusCode::NOT_FOUND,
    StatusCode::UNAUTHORIZED,
    StatusCode::FORBIDDEN,
];

/// Replaces bare 404/401/403 responses with the site's error views.
///
/// Looks for `Error{code}` first, then `Error`. Responses that already carry a
/// body and background requests pass through untouched.
pub struct StatusPageInterceptor {
    views: Arc<ViewEngine>,
}

impl StatusPageInterceptor {
    pub fn new(views: Arc<ViewEngine>) -> Self {
        Self { views }
    }

    fn render(&self, status: StatusCode, scope: &ViewScope) -> Option<String> {
        let context = self.views.context(scope).with_status(status.as_u16());
        let specific = format!("Error{}", status.as_u16());
        [specific.as_str(), "Error"].into_iter().find_map(|view| {
            match self.views.render(view, None, &context) {
                Ok(html) => Some(html),
                Err(e) => {
                    tracing::debug!("No status page from {}: {}", view, e);
                    None
                }
            }
        })
    }
}

#[async_trait]
impl Interceptor for StatusPageInterceptor {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        let scope = ViewScope::from_request_head(request.headers(), request.extensions());
        let response = next.run(request).await?;

        let status = response.status();
        let is_empty = response.body().size_hint().exact() == Some(0);
        if scope.background || !is_empty || !HANDLED.contains(&status) {
            return Ok(response);
        }

        match self.render(status, &scope) {
            Some(html) => Ok((status, Html(html)).into_response()),
            None => Ok(response),
        }
    }
}
