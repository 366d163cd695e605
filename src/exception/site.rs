use super::{ErrorReport, ExceptionFilter, RequestSummary};
use crate::view::{ViewEngine, ViewScope};
use async_trait::async_trait;
use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use std::path::PathBuf;
use std::sync::Arc;

/// View rendered for unhandled errors in production
pub const ERROR_VIEW: &str = "Static";

const FALLBACK_HTML: &str = r#"<!DOCTYPE html>
<html><head><title>500 - Internal Server Error</title></head>
<body><h1>500 - Internal Server Error</h1></body></html>"#;

/// Production error page: the `Static` view, then a static HTML document
pub struct SiteExceptionFilter {
    views: Arc<ViewEngine>,
    static_error: PathBuf,
}

impl SiteExceptionFilter {
    /// `static_error` is served when the view itself fails
    pub fn new(views: Arc<ViewEngine>, static_error: impl Into<PathBuf>) -> Self {
        Self {
            views,
            static_error: static_error.into(),
        }
    }

    async fn static_document(&self) -> String {
        match tokio::fs::read_to_string(&self.static_error).await {
            Ok(html) => html,
            Err(e) => {
                tracing::error!(
                    "Failed to read static error page {}: {}",
                    self.static_error.display(),
                    e
                );
                FALLBACK_HTML.to_string()
            }
        }
    }
}

#[async_trait]
impl ExceptionFilter for SiteExceptionFilter {
    async fn catch(
        &self,
        _report: &ErrorReport,
        request: &RequestSummary,
        scope: &ViewScope,
    ) -> Response {
        let context = self.views.context(scope).with_status(500);

        let html = match self.views.render(ERROR_VIEW, None, &context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!(
                    path = %request.path,
                    "Failed to render error view: {}",
                    e
                );
                self.static_document().await
            }
        };

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")],
            Html(html),
        )
            .into_response()
    }
}
