//! Global exception handling
//!
//! Handlers and interceptors report failures as an [`ErrorReport`] in the
//! response extensions. The [`ExceptionInterceptor`] sits near the top of the
//! pipeline and hands those responses to the environment's [`ExceptionFilter`].

use crate::interceptor::{Interceptor, InterceptorResult, Next};
use crate::view::ViewScope;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::error::Error;
use std::sync::Arc;

mod developer;
mod site;

pub use developer::DeveloperExceptionFilter;
pub use site::SiteExceptionFilter;

/// An unhandled failure on its way to the error page
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    /// `source()` chain, outermost first, excluding `message`
    pub chain: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorReport {
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        let mut report = Self::from_dyn(error);
        report.kind = std::any::type_name::<E>().to_string();
        report
    }

    pub fn from_dyn(error: &(dyn Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        Self {
            kind: "error".to_string(),
            message: error.to_string(),
            chain,
            occurred_at: Utc::now(),
        }
    }

    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "handler panicked".to_string());
        Self {
            kind: "panic".to_string(),
            message,
            chain: Vec::new(),
            occurred_at: Utc::now(),
        }
    }

}

/// A bare 500 carrying the report, for the exception interceptor to render
impl IntoResponse for ErrorReport {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Response for a panic caught by the catch-panic layer
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("Request handler panicked");
    ErrorReport::from_panic(payload.as_ref()).into_response()
}

/// The parts of the failed request shown on diagnostic pages
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
}

/// Headers whose values never appear on an error page
const REDACTED_HEADERS: [&str; 2] = ["authorization", "cookie"];

impl RequestSummary {
    pub fn from_request(request: &Request<Body>) -> Self {
        let headers = request
            .headers()
            .iter()
            .map(|(name, value)| {
                let value = if REDACTED_HEADERS.contains(&name.as_str()) {
                    "[redacted]".to_string()
                } else {
                    value.to_str().unwrap_or("[binary]").to_string()
                };
                (name.to_string(), value)
            })
            .collect();
        Self {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            headers,
        }
    }
}

/// Turns an unhandled failure into the response the visitor sees
#[async_trait]
pub trait ExceptionFilter: Send + Sync + 'static {
    async fn catch(
        &self,
        report: &ErrorReport,
        request: &RequestSummary,
        scope: &ViewScope,
    ) -> Response;
}

/// Routes failures from everything inside it to an [`ExceptionFilter`]
pub struct ExceptionInterceptor {
    filter: Arc<dyn ExceptionFilter>,
}

impl ExceptionInterceptor {
    pub fn new(filter: Arc<dyn ExceptionFilter>) -> Self {
        Self { filter }
    }
}

#[async_trait]
impl Interceptor for ExceptionInterceptor {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        let summary = RequestSummary::from_request(&request);
        let scope = ViewScope::from_request_head(request.headers(), request.extensions());

        let response = match next.run(request).await {
            Ok(response) => response,
            Err(error) => {
                let report = ErrorReport::from_dyn(error.as_ref());
                return Ok(self.filter.catch(&report, &summary, &scope).await);
            }
        };

        match response.extensions().get::<ErrorReport>() {
            Some(report) => {
                tracing::error!(
                    method = %summary.method,
                    path = %summary.path,
                    "Unhandled {}: {}",
                    report.kind,
                    report.message
                );
                Ok(self.filter.catch(report, &summary, &scope).await)
            }
            None => Ok(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn test_report_collects_source_chain() {
        let error = Outer {
            source: std::io::Error::other("disk full"),
        };
        let report = ErrorReport::from_error(&error);
        assert_eq!(report.message, "outer failure");
        assert_eq!(report.chain, vec!["disk full".to_string()]);
        assert!(report.kind.ends_with("Outer"));
    }

    #[test]
    fn test_panic_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(ErrorReport::from_panic(payload.as_ref()).message, "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(ErrorReport::from_panic(payload.as_ref()).message, "bang");
        let response = panic_response(Box::new(42u8));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }

    #[test]
    fn test_summary_redacts_credentials() {
        let request = Request::builder()
            .uri("/contact?x=1")
            .header("authorization", "Bearer secret")
            .header("accept", "text/html")
            .body(Body::empty())
            .unwrap();
        let summary = RequestSummary::from_request(&request);
        assert_eq!(summary.path, "/contact");
        assert_eq!(summary.query.as_deref(), Some("x=1"));
        assert!(summary
            .headers
            .contains(&("authorization".to_string(), "[redacted]".to_string())));
    }
}
