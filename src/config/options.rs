//! Strongly typed option sections bound from the layered configuration.
//!
//! Keys are PascalCase so `appsettings.json` reads like
//! `{ "SiteOptions": { "UseAuthentication": true } }`.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Every option section the site host knows about
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppSettings {
    pub hosting: HostingOptions,
    pub site_options: SiteOptions,
    pub data_options: DataOptions,
    pub security_options: SecurityOptions,
    pub form_options: FormOptions,
    pub mvc_options: MvcOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostingOptions {
    pub address: String,
}

impl Default for HostingOptions {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SiteOptions {
    pub site_name: String,
    /// Supported cultures, the first one is the default
    pub cultures: Vec<String>,
    /// Modules with their own route template, e.g. `/news`
    pub modules: Vec<ModuleRoute>,
    pub lowercase_urls: bool,
    /// Permanent redirects from old paths to new ones
    pub redirects: BTreeMap<String, String>,
    pub output_cache: OutputCacheOptions,
    pub hsts_max_age_seconds: u64,
    pub domain_options: DomainOptions,
}

impl Default for SiteOptions {
    fn default() -> Self {
        Self {
            site_name: "Easyweb".to_string(),
            cultures: vec!["sv-SE".to_string()],
            modules: Vec::new(),
            lowercase_urls: true,
            redirects: BTreeMap::new(),
            output_cache: OutputCacheOptions::default(),
            hsts_max_age_seconds: 30 * 24 * 60 * 60,
            domain_options: DomainOptions::default(),
        }
    }
}

impl SiteOptions {
    pub fn default_culture(&self) -> &str {
        self.cultures.first().map(String::as_str).unwrap_or("en-US")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DomainOptions {
    pub custom_host: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleRoute {
    pub name: String,
    pub route: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OutputCacheOptions {
    pub enabled: bool,
    pub duration_seconds: u64,
    pub max_entries: usize,
}

impl Default for OutputCacheOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_seconds: 60,
            max_entries: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DataOptions {
    /// JSON file with the site's pages, relative to the content root
    pub content_path: String,
    /// Directory holding `images/` and `documents/`, relative to the content root
    pub media_path: String,
}

impl Default for DataOptions {
    fn default() -> Self {
        Self {
            content_path: "Content/pages.json".to_string(),
            media_path: "Media".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecurityOptions {
    /// Enables member login for the site itself. Admin login is always on.
    pub use_authentication: bool,
    pub admin_tokens: Vec<String>,
    pub member_tokens: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FormOptions {
    pub captcha_field: String,
    pub honeypot_field: String,
    pub captcha_min_seconds: u64,
    pub captcha_max_age_minutes: u64,
    pub max_body_bytes: usize,
    /// Accepted submissions kept in memory, oldest dropped first
    pub max_stored_submissions: usize,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            captcha_field: "ew-captcha".to_string(),
            honeypot_field: "ew-hp".to_string(),
            captcha_min_seconds: 2,
            captcha_max_age_minutes: 60,
            max_body_bytes: 1024 * 1024,
            max_stored_submissions: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MvcOptions {
    /// Re-read view templates on every render
    pub runtime_compilation: bool,
    pub views_path: String,
    pub resources_path: String,
}

impl Default for MvcOptions {
    fn default() -> Self {
        Self {
            runtime_compilation: false,
            views_path: "Views".to_string(),
            resources_path: "Resources".to_string(),
        }
    }
}
