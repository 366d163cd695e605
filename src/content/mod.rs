//! CMS data services: the pages a site can link to and how request paths map to them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

mod resolver;
mod store;

pub use resolver::LinkableResolver;
pub use store::{ContentStore, JsonContentStore};

/// Named destinations picked from an operation's outcome
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ResultLink {
    GoodPostPage,
    BadPostPage,
}

/// A page that can be rendered for a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Linkable {
    pub id: String,
    pub path: String,
    pub title: String,
    /// View to render instead of `Index`
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub requires_authentication: bool,
    #[serde(default)]
    pub result_link: Option<ResultLink>,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Linkable {
    pub fn new(id: impl Into<String>, path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: normalize_path(&path.into()),
            title: title.into(),
            view: None,
            module: None,
            body: String::new(),
            requires_authentication: false,
            result_link: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_result_link(mut self, link: ResultLink) -> Self {
        self.result_link = Some(link);
        self
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    pub fn view_name(&self) -> &str {
        self.view.as_deref().unwrap_or("Index")
    }
}

/// Canonical form of a site path: leading slash, no trailing slash, no query, lowercase
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed.to_lowercase())
    }
}
