use crate::interceptor::{Interceptor, InterceptorResult, Next};
use async_trait::async_trait;
use axum::{body::Body, http::Request};
use std::time::Instant;

/// Logs method, path, status and latency of every request
#[derive(Clone, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        let method = request.method().clone();
        let uri = request.uri().clone();
        let start = Instant::now();

        tracing::debug!("--> {} {}", method, uri);

        match next.run(request).await {
            Ok(response) => {
                let status = response.status();
                if status.is_server_error() {
                    tracing::warn!("<-- {} {} {} {:?}", method, uri, status, start.elapsed());
                } else {
                    tracing::info!("<-- {} {} {} {:?}", method, uri, status, start.elapsed());
                }
                Ok(response)
            }
            Err(e) => {
                tracing::error!("<-- {} {} ERROR: {} {:?}", method, uri, e, start.elapsed());
                Err(e)
            }
        }
    }
}
