use crate::exception::ErrorReport;
use crate::interceptor::{Interceptor, InterceptorResult, Next};
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer running an ordered chain of interceptors
#[derive(Clone)]
pub struct InterceptorLayer {
    interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
}

impl InterceptorLayer {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptors: Arc::new(interceptors),
        }
    }

    pub fn single(interceptor: impl Interceptor) -> Self {
        Self::new(vec![Arc::new(interceptor)])
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl<S> Layer<S> for InterceptorLayer {
    type Service = InterceptorMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InterceptorMiddleware {
            inner,
            interceptors: self.interceptors.clone(),
        }
    }
}

#[derive(Clone)]
pub struct InterceptorMiddleware<S> {
    inner: S,
    interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
}

impl<S> Service<Request<Body>> for InterceptorMiddleware<S>
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
        let interceptors = self.interceptors.clone();
        // Keep the service that was polled ready, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut chain = Next::new(move |req| {
                Box::pin(async move {
                    let response = inner.call(req).await.unwrap_or_else(|never| match never {});
                    Ok(response)
                })
            });

            for i in (0..interceptors.len()).rev() {
                let interceptors = interceptors.clone();
                let next = chain;
                chain = Next::new(move |req| {
                    Box::pin(async move { interceptors[i].intercept(req, next).await })
                });
            }

            Ok(into_response(chain.run(request).await))
        })
    }
}

fn into_response(result: InterceptorResult) -> Response {
    match result {
        Ok(response) => response,
        Err(error) => {
            tracing::error!("Interceptor failed: {}", error);
            ErrorReport::from_dyn(error.as_ref()).into_response()
        }
    }
}
