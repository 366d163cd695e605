use crate::interceptor::{Interceptor, InterceptorResult, Next};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
};
use chrono::{DateTime, Utc};

/// Marks a request as a form post, so every view rendered for it knows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostNotification {
    pub received_at: DateTime<Utc>,
}

/// Global MVC filter inserting [`PostNotification`] on POST requests
#[derive(Clone, Default)]
pub struct PostNotificationInterceptor;

#[async_trait]
impl Interceptor for PostNotificationInterceptor {
    async fn intercept(&self, mut request: Request<Body>, next: Next) -> InterceptorResult {
        if request.method() == Method::POST {
            request.extensions_mut().insert(PostNotification {
                received_at: Utc::now(),
            });
        }
        next.run(request).await
    }
}
