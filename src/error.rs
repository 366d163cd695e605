use crate::config::ConfigError;
use crate::exception::ErrorReport;
use crate::view::ViewError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SiteError>;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("Dependency not found: {type_name}")]
    DependencyNotFound { type_name: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("View rendering failed: {0}")]
    View(#[from] ViewError),

    #[error("Form processing failed: {0}")]
    FormProcessing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for SiteError {
    fn into_response(self) -> Response {
        match &self {
            // Left empty so the status page handler can render the site's own page.
            SiteError::NotFound(what) => {
                tracing::debug!("Not found: {}", what);
                StatusCode::NOT_FOUND.into_response()
            }
            _ => {
                tracing::error!("Unhandled error: {}", self);
                ErrorReport::from_error(&self).into_response()
            }
        }
    }
}
