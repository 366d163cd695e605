//! Request interceptors
//!
//! An interceptor sees the request before the rest of the pipeline and the
//! response after it. [`InterceptorLayer`] runs an ordered chain of them, the
//! first one wrapping everything after it.

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use std::future::Future;
use std::pin::Pin;

mod authentication;
mod defaults;
mod layer;
mod logging;
mod output_cache;
mod post_notification;
mod redirects;
mod status_pages;

pub use authentication::AuthenticationInterceptor;
pub use defaults::{SiteDefaultsInterceptor, WebRootInterceptor};
pub use layer::{InterceptorLayer, InterceptorMiddleware};
pub use logging::LoggingInterceptor;
pub use output_cache::OutputCacheInterceptor;
pub use post_notification::{PostNotification, PostNotificationInterceptor};
pub use redirects::RedirectInterceptor;
pub use status_pages::StatusPageInterceptor;

/// Standard return type for interceptors
pub type InterceptorResult = Result<Response, InterceptorError>;

/// A type-erased error for interceptors
pub type InterceptorError = Box<dyn std::error::Error + Send + Sync>;

type BoxFuture = Pin<Box<dyn Future<Output = InterceptorResult> + Send>>;

/// The rest of the chain
pub struct Next {
    run: Box<dyn FnOnce(Request<Body>) -> BoxFuture + Send>,
}

impl Next {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Request<Body>) -> BoxFuture + Send + 'static,
    {
        Self { run: Box::new(f) }
    }

    pub async fn run(self, request: Request<Body>) -> InterceptorResult {
        (self.run)(request).await
    }
}

/// Inspect or rewrite a request on its way in and the response on its way out.
///
/// Returning a response without calling `next` short-circuits the pipeline.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult;
}
