use crate::guard::{Guard, GuardError, GuardResult};
use crate::services::{CaptchaValidator, FormCollection};
use async_trait::async_trait;
use axum::{body::Body, http::Request};
use std::sync::Arc;

/// Rejects form posts without a valid CAPTCHA answer
pub struct ValidateFormCaptcha {
    validator: Arc<dyn CaptchaValidator>,
}

impl ValidateFormCaptcha {
    pub fn new(validator: Arc<dyn CaptchaValidator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Guard for ValidateFormCaptcha {
    async fn can_activate(&self, request: &mut Request<Body>) -> GuardResult {
        let empty = FormCollection::default();
        let form = request
            .extensions()
            .get::<FormCollection>()
            .unwrap_or(&empty);

        self.validator.validate(form).await.map_err(|rejection| {
            tracing::info!("CAPTCHA rejected for {}: {}", request.uri().path(), rejection);
            GuardError::BadRequest(rejection.to_string())
        })
    }
}
