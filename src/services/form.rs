use crate::config::FormOptions;
use crate::content::Linkable;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Hidden field listing the names of required fields, comma separated
pub const REQUIRED_FIELD: &str = "ew-required";

/// Hidden field naming the posted form, so templates can tell their own posts apart
pub const FORM_ID_FIELD: &str = "ew-form-id";

/// Posted form fields in the order they were sent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormCollection {
    fields: Vec<(String, String)>,
}

impl FormCollection {
    pub fn from_urlencoded(body: &[u8]) -> std::result::Result<Self, serde_urlencoded::de::Error> {
        let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(body)?;
        Ok(Self { fields })
    }

    /// First value posted for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn form_id(&self) -> Option<&str> {
        self.get(FORM_ID_FIELD).filter(|id| !id.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormCollection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Outcome of handling a posted form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormPostResult {
    pub successful: bool,
    pub errors: Vec<String>,
    pub submission_id: Option<Uuid>,
}

impl FormPostResult {
    pub fn succeeded(submission_id: Uuid) -> Self {
        Self {
            successful: true,
            errors: Vec::new(),
            submission_id: Some(submission_id),
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            successful: false,
            errors,
            submission_id: None,
        }
    }
}

/// Form validation and storage
#[async_trait]
pub trait FormService: Send + Sync + 'static {
    async fn handle_form(&self, form: &FormCollection, page: &Linkable) -> Result<FormPostResult>;
}

#[derive(Debug, Clone, Serialize)]
pub struct FormSubmission {
    pub id: Uuid,
    pub page_id: String,
    pub page_path: String,
    pub form_id: Option<String>,
    pub fields: Vec<(String, String)>,
    pub submitted_at: DateTime<Utc>,
}

/// In-memory record of accepted submissions, holding at most `capacity`
pub struct FormSubmissionStore {
    submissions: DashMap<Uuid, FormSubmission>,
    capacity: usize,
}

impl FormSubmissionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            submissions: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Store `submission`, dropping the oldest ones once over capacity
    pub fn insert(&self, submission: FormSubmission) {
        self.submissions.insert(submission.id, submission);
        while self.submissions.len() > self.capacity {
            let oldest = self
                .submissions
                .iter()
                .min_by_key(|s| s.submitted_at)
                .map(|s| *s.key());
            match oldest {
                Some(id) => {
                    self.submissions.remove(&id);
                    tracing::debug!("Dropped submission {} from the store", id);
                }
                None => break,
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<FormSubmission> {
        self.submissions.get(id).map(|s| s.value().clone())
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}

/// Validates required fields and stores the submission
pub struct DefaultFormService {
    store: Arc<FormSubmissionStore>,
    options: FormOptions,
}

impl DefaultFormService {
    pub fn new(store: Arc<FormSubmissionStore>, options: FormOptions) -> Self {
        Self { store, options }
    }

    fn is_internal(&self, name: &str) -> bool {
        name.starts_with("ew-")
            || name.starts_with("__")
            || name == self.options.captcha_field
            || name == self.options.honeypot_field
    }
}

#[async_trait]
impl FormService for DefaultFormService {
    async fn handle_form(&self, form: &FormCollection, page: &Linkable) -> Result<FormPostResult> {
        let mut errors = Vec::new();

        for name in form
            .get(REQUIRED_FIELD)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            let filled = form.get_all(name).any(|value| !value.trim().is_empty());
            if !filled {
                errors.push(format!("{} is required", name));
            }
        }

        let fields: Vec<(String, String)> = form
            .iter()
            .filter(|(name, _)| !self.is_internal(name))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        if fields.is_empty() {
            errors.push("The form contained no fields".to_string());
        }

        if !errors.is_empty() {
            tracing::warn!(
                page = %page.path,
                errors = errors.len(),
                "Form post rejected"
            );
            return Ok(FormPostResult::failed(errors));
        }

        let submission = FormSubmission {
            id: Uuid::new_v4(),
            page_id: page.id.clone(),
            page_path: page.path.clone(),
            form_id: form.form_id().map(str::to_string),
            fields,
            submitted_at: Utc::now(),
        };
        let id = submission.id;
        self.store.insert(submission);

        tracing::info!(page = %page.path, submission = %id, "Form post stored");
        Ok(FormPostResult::succeeded(id))
    }
}
