use crate::guard::{Guard, GuardError};
use crate::services::FormCollection;
use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, header},
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer running a route's guards before its handler
#[derive(Clone)]
pub struct GuardLayer {
    guards: Arc<Vec<Arc<dyn Guard>>>,
    max_body_bytes: usize,
}

impl GuardLayer {
    pub fn new(guards: Vec<Arc<dyn Guard>>, max_body_bytes: usize) -> Self {
        Self {
            guards: Arc::new(guards),
            max_body_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl<S> Layer<S> for GuardLayer {
    type Service = GuardMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GuardMiddleware {
            inner,
            guards: self.guards.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

#[derive(Clone)]
pub struct GuardMiddleware<S> {
    inner: S,
    guards: Arc<Vec<Arc<dyn Guard>>>,
    max_body_bytes: usize,
}

fn is_form_post(request: &Request<Body>) -> bool {
    let urlencoded = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));
    urlencoded && matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH)
}

/// Read a url-encoded body into a [`FormCollection`] extension and put the bytes back
async fn buffer_form(request: Request<Body>, limit: usize) -> Result<Request<Body>, GuardError> {
    let (mut parts, body) = request.into_parts();
    let bytes = to_bytes(body, limit)
        .await
        .map_err(|_| GuardError::PayloadTooLarge)?;
    let form = FormCollection::from_urlencoded(&bytes)
        .map_err(|e| GuardError::BadRequest(format!("Malformed form body: {}", e)))?;
    parts.extensions.insert(form);
    Ok(Request::from_parts(parts, Body::from(bytes)))
}

impl<S> Service<Request<Body>> for GuardMiddleware<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let guards = self.guards.clone();
        let limit = self.max_body_bytes;
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut request = request;
            if is_form_post(&request) {
                request = match buffer_form(request, limit).await {
                    Ok(request) => request,
                    Err(e) => return Ok(e.into_response()),
                };
            }

            for guard in guards.iter() {
                if let Err(e) = guard.can_activate(&mut request).await {
                    return Ok(e.into_response());
                }
            }
            inner.call(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::GuardResult;
    use async_trait::async_trait;
    use axum::{Extension, Router, http::StatusCode, routing::post};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct RequireField(&'static str);

    #[async_trait]
    impl Guard for RequireField {
        async fn can_activate(&self, request: &mut Request<Body>) -> GuardResult {
            let present = request
                .extensions()
                .get::<FormCollection>()
                .is_some_and(|form| form.get(self.0).is_some());
            if present {
                Ok(())
            } else {
                Err(GuardError::BadRequest(format!("{} missing", self.0)))
            }
        }
    }

    struct Count(Arc<AtomicUsize>);

    #[async_trait]
    impl Guard for Count {
        async fn can_activate(&self, _request: &mut Request<Body>) -> GuardResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn form(body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    fn app(count: Arc<AtomicUsize>, limit: usize) -> Router {
        let layer = GuardLayer::new(
            vec![Arc::new(RequireField("name")), Arc::new(Count(count))],
            limit,
        );
        Router::new().route(
            "/",
            post(|Extension(form): Extension<FormCollection>, body: String| async move {
                format!("{}|{}", form.get("name").unwrap_or_default(), body)
            })
            .route_layer(layer),
        )
    }

    #[tokio::test]
    async fn test_form_is_shared_and_body_restored() {
        let count = Arc::new(AtomicUsize::new(0));
        let response = app(count.clone(), 1024).oneshot(form("name=Ada")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Ada|name=Ada");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_denial_stops_the_chain() {
        let count = Arc::new(AtomicUsize::new(0));
        let response = app(count.clone(), 1024).oneshot(form("other=1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let count = Arc::new(AtomicUsize::new(0));
        let response = app(count, 4).oneshot(form("name=far-too-long")).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
