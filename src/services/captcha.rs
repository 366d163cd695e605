use super::FormCollection;
use crate::config::FormOptions;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Above this many outstanding tokens, expired ones are dropped on issue
const PURGE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptchaRejection {
    #[error("captcha token missing")]
    Missing,

    #[error("captcha token unknown or already used")]
    Unknown,

    #[error("form submitted too quickly")]
    TooFast,

    #[error("captcha token expired")]
    Expired,

    #[error("honeypot field was filled in")]
    Honeypot,
}

/// Decides whether a posted form came from a person
#[async_trait]
pub trait CaptchaValidator: Send + Sync + 'static {
    async fn validate(&self, form: &FormCollection) -> Result<(), CaptchaRejection>;
}

/// Single-use tokens handed out to rendered forms
pub struct CaptchaStore {
    issued: DashMap<String, DateTime<Utc>>,
    min_age: Duration,
    max_age: Duration,
}

impl CaptchaStore {
    pub fn new(options: &FormOptions) -> Self {
        Self {
            issued: DashMap::new(),
            min_age: seconds(options.captcha_min_seconds, 1),
            max_age: seconds(options.captcha_max_age_minutes, 60),
        }
    }

    pub fn issue(&self) -> String {
        self.issue_at(Utc::now())
    }

    pub fn issue_at(&self, now: DateTime<Utc>) -> String {
        if self.issued.len() > PURGE_THRESHOLD {
            self.purge_expired(now);
        }
        let token = Uuid::new_v4().simple().to_string();
        self.issued.insert(token.clone(), now);
        token
    }

    pub fn redeem(&self, token: &str) -> Result<(), CaptchaRejection> {
        self.redeem_at(token, Utc::now())
    }

    /// Consume `token`. A token is spent even when it is rejected for timing.
    pub fn redeem_at(&self, token: &str, now: DateTime<Utc>) -> Result<(), CaptchaRejection> {
        let (_, issued_at) = self
            .issued
            .remove(token)
            .ok_or(CaptchaRejection::Unknown)?;
        let age = now - issued_at;
        if age < self.min_age {
            return Err(CaptchaRejection::TooFast);
        }
        if age > self.max_age {
            return Err(CaptchaRejection::Expired);
        }
        Ok(())
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) {
        let max_age = self.max_age;
        self.issued.retain(|_, issued_at| now - *issued_at <= max_age);
    }

    pub fn outstanding(&self) -> usize {
        self.issued.len()
    }
}

/// `count * unit` seconds, saturating at the longest representable duration
fn seconds(count: u64, unit: i64) -> Duration {
    i64::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(unit))
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Token plus honeypot validation
pub struct TokenCaptchaValidator {
    store: Arc<CaptchaStore>,
    token_field: String,
    honeypot_field: String,
}

impl TokenCaptchaValidator {
    pub fn new(store: Arc<CaptchaStore>, options: &FormOptions) -> Self {
        Self {
            store,
            token_field: options.captcha_field.clone(),
            honeypot_field: options.honeypot_field.clone(),
        }
    }
}

#[async_trait]
impl CaptchaValidator for TokenCaptchaValidator {
    async fn validate(&self, form: &FormCollection) -> Result<(), CaptchaRejection> {
        if form
            .get(&self.honeypot_field)
            .is_some_and(|value| !value.is_empty())
        {
            return Err(CaptchaRejection::Honeypot);
        }
        let token = form
            .get(&self.token_field)
            .filter(|token| !token.is_empty())
            .ok_or(CaptchaRejection::Missing)?;
        self.store.redeem(token)
    }
}
