use crate::content::normalize_path;
use crate::interceptor::{Interceptor, InterceptorResult, Next};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::{IntoResponse, Redirect},
};
use std::collections::BTreeMap;

/// Permanent redirects for moved pages and mixed-case URLs
pub struct RedirectInterceptor {
    redirects: BTreeMap<String, String>,
    lowercase_urls: bool,
}

impl RedirectInterceptor {
    pub fn new(redirects: &BTreeMap<String, String>, lowercase_urls: bool) -> Self {
        Self {
            redirects: redirects
                .iter()
                .map(|(from, to)| (normalize_path(from), to.clone()))
                .collect(),
            lowercase_urls,
        }
    }

    /// Where `path` should be redirected to, if anywhere
    pub fn target(&self, path: &str, query: Option<&str>) -> Option<String> {
        if let Some(to) = self.redirects.get(&normalize_path(path)) {
            return Some(to.clone());
        }
        if self.lowercase_urls && !is_file_path(path) && path.chars().any(|c| c.is_ascii_uppercase()) {
            let lower = path.to_ascii_lowercase();
            return Some(match query {
                Some(query) => format!("{}?{}", lower, query),
                None => lower,
            });
        }
        None
    }
}

/// Media and document names keep their case
fn is_file_path(path: &str) -> bool {
    path.rsplit('/').next().is_some_and(|last| last.contains('.'))
}

#[async_trait]
impl Interceptor for RedirectInterceptor {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        if matches!(*request.method(), Method::GET | Method::HEAD) {
            if let Some(to) = self.target(request.uri().path(), request.uri().query()) {
                tracing::debug!("Redirecting {} to {}", request.uri(), to);
                return Ok(Redirect::permanent(&to).into_response());
            }
        }
        next.run(request).await
    }
}
