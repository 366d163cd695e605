use super::{ErrorReport, ExceptionFilter, RequestSummary};
use crate::view::ViewScope;
use async_trait::async_trait;
use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use minijinja::{Environment, context, default_auto_escape_callback};

const TEMPLATE_NAME: &str = "developer_exception.html";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{ report.kind }}: {{ report.message }}</title>
<style>
body { font-family: Consolas, Menlo, monospace; margin: 2em; color: #222; }
h1 { color: #a31515; font-size: 1.4em; }
table { border-collapse: collapse; }
td { border-bottom: 1px solid #ddd; padding: 2px 12px 2px 0; vertical-align: top; }
</style>
</head>
<body>
<h1>An unhandled exception occurred while processing the request.</h1>
<p><strong>{{ report.kind }}</strong>: {{ report.message }}</p>
{% if report.chain %}
<h2>Caused by</h2>
<ol>{% for cause in report.chain %}<li>{{ cause }}</li>{% endfor %}</ol>
{% endif %}
<h2>Request</h2>
<p>{{ request.method }} {{ request.path }}{% if request.query %}?{{ request.query }}{% endif %}</p>
<table>{% for header in request.headers %}<tr><td>{{ header[0] }}</td><td>{{ header[1] }}</td></tr>{% endfor %}</table>
<p><small>{{ report.occurred_at }}</small></p>
</body>
</html>
"#;

/// Detailed diagnostic page for development
pub struct DeveloperExceptionFilter {
    env: Environment<'static>,
}

impl DeveloperExceptionFilter {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(default_auto_escape_callback);
        if let Err(e) = env.add_template(TEMPLATE_NAME, TEMPLATE) {
            tracing::error!("Developer exception template is invalid: {}", e);
        }
        Self { env }
    }

    fn render(&self, report: &ErrorReport, request: &RequestSummary) -> String {
        self.env
            .get_template(TEMPLATE_NAME)
            .and_then(|t| t.render(context! { report => report, request => request }))
            .unwrap_or_else(|e| {
                tracing::error!("Failed to render developer exception page: {}", e);
                format!("{}: {}", report.kind, report.message)
            })
    }
}

impl Default for DeveloperExceptionFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExceptionFilter for DeveloperExceptionFilter {
    async fn catch(
        &self,
        report: &ErrorReport,
        request: &RequestSummary,
        _scope: &ViewScope,
    ) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")],
            Html(self.render(report, request)),
        )
            .into_response()
    }
}
