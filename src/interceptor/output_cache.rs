use crate::interceptor::{Interceptor, InterceptorResult, Next};
use crate::services::{CachedResponse, OutputCache, Principal, RequestCulture};
use async_trait::async_trait;
use axum::{
    body::{Body, HttpBody, to_bytes},
    http::{HeaderValue, Method, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Header telling whether a page came from the output cache
pub const CACHE_HEADER: &str = "x-output-cache";

/// Largest page body that is stored
const MAX_CACHED_BODY: usize = 2 * 1024 * 1024;

/// Replays rendered pages for anonymous GET requests
pub struct OutputCacheInterceptor {
    cache: Arc<OutputCache>,
}

impl OutputCacheInterceptor {
    pub fn new(cache: Arc<OutputCache>) -> Self {
        Self { cache }
    }
}

fn cacheable_request(request: &Request<Body>) -> bool {
    request.method() == Method::GET
        && request.extensions().get::<Principal>().is_none()
        && !crate::request::is_background_request(request.headers())
}

/// Pages marked `private` or `no-store` carry per-visitor tokens
fn is_private(response: &Response) -> bool {
    response
        .headers()
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|directive| {
            directive.eq_ignore_ascii_case("private") || directive.eq_ignore_ascii_case("no-store")
        })
}

fn cacheable_response(response: &Response) -> bool {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    let fits = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= MAX_CACHED_BODY as u64);
    response.status() == StatusCode::OK
        && is_html
        && fits
        && !response.headers().contains_key(header::SET_COOKIE)
        && !is_private(response)
}

fn replay(cached: CachedResponse) -> Response {
    let mut response = (cached.status, cached.body).into_response();
    if let Some(content_type) = cached.content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    response
        .headers_mut()
        .insert(CACHE_HEADER, HeaderValue::from_static("hit"));
    response
}

#[async_trait]
impl Interceptor for OutputCacheInterceptor {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        if !cacheable_request(&request) {
            return next.run(request).await;
        }

        let culture = request
            .extensions()
            .get::<RequestCulture>()
            .map(|c| c.0.clone())
            .unwrap_or_default();
        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());
        let key = OutputCache::key(request.method().as_str(), &path_and_query, &culture);

        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("Output cache hit for {}", key);
            return Ok(replay(cached));
        }

        let response = next.run(request).await?;
        if !cacheable_response(&response) {
            return Ok(response);
        }

        let (mut parts, body) = response.into_parts();
        let bytes = to_bytes(body, MAX_CACHED_BODY).await?;
        let content_type = parts.headers.get(header::CONTENT_TYPE).cloned();
        self.cache.insert(
            key,
            CachedResponse::new(parts.status, content_type, bytes.clone()),
        );
        parts
            .headers
            .insert(CACHE_HEADER, HeaderValue::from_static("miss"));
        Ok(Response::from_parts(parts, Body::from(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::Next;
    use crate::services::Role;
    use axum::response::Html;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting(calls: Arc<AtomicUsize>) -> Next {
        Next::new(move |_request| {
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(Html(format!("render {}", n)).into_response())
            })
        })
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_second_request_is_replayed() {
        let interceptor =
            OutputCacheInterceptor::new(Arc::new(OutputCache::new(Duration::from_secs(60), 10)));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = interceptor.intercept(get("/about"), counting(calls.clone())).await.unwrap();
        assert_eq!(first.headers()[CACHE_HEADER], "miss");
        let second = interceptor.intercept(get("/about"), counting(calls.clone())).await.unwrap();
        assert_eq!(second.headers()[CACHE_HEADER], "hit");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"render 0");
    }

    #[tokio::test]
    async fn test_private_pages_are_not_stored() {
        let interceptor =
            OutputCacheInterceptor::new(Arc::new(OutputCache::new(Duration::from_secs(60), 10)));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let next = Next::new(move |_request| {
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok((
                        [(header::CACHE_CONTROL, "private, no-store")],
                        Html("<input name=ew-captcha value=abc>"),
                    )
                        .into_response())
                })
            });
            let response = interceptor.intercept(get("/contact"), next).await.unwrap();
            assert!(response.headers().get(CACHE_HEADER).is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_oversized_page_is_served_uncached() {
        let interceptor =
            OutputCacheInterceptor::new(Arc::new(OutputCache::new(Duration::from_secs(60), 10)));
        let next = Next::new(|_request| {
            Box::pin(async move { Ok(Html("x".repeat(3 * 1024 * 1024)).into_response()) })
        });

        let response = interceptor.intercept(get("/big"), next).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(CACHE_HEADER).is_none());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 3 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_logged_in_visitors_bypass_cache() {
        let interceptor =
            OutputCacheInterceptor::new(Arc::new(OutputCache::new(Duration::from_secs(60), 10)));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let mut request = get("/about");
            request.extensions_mut().insert(Principal {
                name: "admin-1".to_string(),
                role: Role::Admin,
            });
            interceptor.intercept(request, counting(calls.clone())).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
