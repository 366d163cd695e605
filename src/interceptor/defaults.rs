//! Platform defaults applied to every page request.

use crate::interceptor::{Interceptor, InterceptorResult, Next};
use crate::services::thumbnail::media_path;
use crate::services::{Localizer, RequestCulture};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderValue, Method, Request, header},
};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Cookie that pins a visitor to one of the supported cultures
pub const CULTURE_COOKIE: &str = "ew-culture";

/// Negotiates the request culture and sets the default response headers
pub struct SiteDefaultsInterceptor {
    localizer: Arc<Localizer>,
}

impl SiteDefaultsInterceptor {
    pub fn new(localizer: Arc<Localizer>) -> Self {
        Self { localizer }
    }

    fn culture_for(&self, request: &Request<Body>) -> String {
        let pinned = crate::request::cookie_value(request.headers(), CULTURE_COOKIE)
            .and_then(|wanted| {
                self.localizer
                    .cultures()
                    .iter()
                    .find(|c| c.eq_ignore_ascii_case(&wanted))
                    .cloned()
            });
        pinned.unwrap_or_else(|| {
            let accept = request
                .headers()
                .get(header::ACCEPT_LANGUAGE)
                .and_then(|v| v.to_str().ok());
            self.localizer.negotiate(accept)
        })
    }
}

#[async_trait]
impl Interceptor for SiteDefaultsInterceptor {
    async fn intercept(&self, mut request: Request<Body>, next: Next) -> InterceptorResult {
        let culture = self.culture_for(&request);
        request
            .extensions_mut()
            .insert(RequestCulture(culture.clone()));

        let mut response = next.run(request).await?;
        let headers = response.headers_mut();
        if !headers.contains_key(header::CONTENT_LANGUAGE) {
            if let Ok(value) = HeaderValue::from_str(&culture) {
                headers.insert(header::CONTENT_LANGUAGE, value);
            }
        }
        headers
            .entry(header::X_CONTENT_TYPE_OPTIONS)
            .or_insert(HeaderValue::from_static("nosniff"));
        Ok(response)
    }
}

/// Serves files from the web root before the request reaches routing
pub struct WebRootInterceptor {
    root: PathBuf,
}

impl WebRootInterceptor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Interceptor for WebRootInterceptor {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        if !matches!(*request.method(), Method::GET | Method::HEAD) {
            return next.run(request).await;
        }
        let file = media_path(&self.root, request.uri().path());
        let Some(file) = file.filter(|path| path.is_file()) else {
            return next.run(request).await;
        };

        tracing::debug!("Serving {} from web root", file.display());
        let response = ServeFile::new(file)
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {});
        Ok(response.map(Body::new))
    }
}
