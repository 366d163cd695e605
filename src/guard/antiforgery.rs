use crate::guard::{Guard, GuardError, GuardResult};
use crate::services::{Antiforgery, FormCollection};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
};

/// Double-submit cookie check for unsafe methods
#[derive(Debug, Clone, Default)]
pub struct ValidateAntiforgeryToken {
    antiforgery: Antiforgery,
}

impl ValidateAntiforgeryToken {
    pub fn new() -> Self {
        Self {
            antiforgery: Antiforgery::new(),
        }
    }
}

#[async_trait]
impl Guard for ValidateAntiforgeryToken {
    async fn can_activate(&self, request: &mut Request<Body>) -> GuardResult {
        if matches!(
            *request.method(),
            Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
        ) {
            return Ok(());
        }
        let form = request.extensions().get::<FormCollection>();
        if self.antiforgery.validate(request.headers(), form) {
            Ok(())
        } else {
            Err(GuardError::BadRequest(
                "Missing or invalid antiforgery token".to_string(),
            ))
        }
    }
}
