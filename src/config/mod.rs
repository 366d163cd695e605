//! Layered application configuration
//!
//! `appsettings.json` is read first, then `appsettings.{Environment}.json`,
//! then environment variables prefixed with `EASYWEB__` where `__` separates
//! sections. Later layers win, objects are merged key by key.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod environment;
mod options;

pub use environment::{EnvironmentName, HostEnvironment};
pub use options::{
    AppSettings, DataOptions, DomainOptions, FormOptions, HostingOptions, ModuleRoute,
    MvcOptions, OutputCacheOptions, SecurityOptions, SiteOptions,
};

/// Prefix of environment variables that override configuration values
pub const ENV_PREFIX: &str = "EASYWEB__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to bind section '{section}': {source}")]
    Bind {
        section: String,
        source: serde_json::Error,
    },
}

/// Merged configuration tree
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    root: Value,
}

impl Configuration {
    /// Load the layered configuration for `env`, including process environment overrides
    pub fn load(env: &HostEnvironment) -> Result<Self, ConfigError> {
        let mut configuration = Self::default();

        let files = [
            env.content_path("appsettings.json"),
            env.content_path(format!("appsettings.{}.json", env.name())),
        ];
        for path in files.iter() {
            if let Some(layer) = read_layer(path)? {
                tracing::debug!("Loaded configuration from {}", path.display());
                configuration.merge(layer);
            }
        }

        Ok(configuration.with_env_overrides(std::env::vars()))
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Merge another layer on top of this one
    pub fn merge(&mut self, layer: Value) {
        merge_values(&mut self.root, layer);
    }

    /// Apply `EASYWEB__Section__Key=value` style overrides
    ///
    /// Values that parse as JSON scalars (`true`, `42`) keep their type,
    /// everything else is taken as a string.
    pub fn with_env_overrides<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(path) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let segments: Vec<&str> = path.split("__").filter(|s| !s.is_empty()).collect();
            if segments.is_empty() {
                continue;
            }
            set_path(&mut self.root, &segments, parse_scalar(&value));
        }
        self
    }

    /// Raw access by colon separated path, e.g. `SiteOptions:DomainOptions:CustomHost`.
    ///
    /// Keys match case-insensitively.
    pub fn get(&self, path: &str) -> Option<String> {
        let mut current = &self.root;
        for segment in path.split(':') {
            current = lookup(current, segment)?;
        }
        match current {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Bind one section to an options type. A missing section yields its defaults.
    pub fn section<T>(&self, name: &str) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Default,
    {
        match lookup(&self.root, name) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|source| ConfigError::Bind {
                    section: name.to_string(),
                    source,
                })
            }
        }
    }

    /// Bind the whole tree to [`AppSettings`]
    pub fn bind(&self) -> Result<AppSettings, ConfigError> {
        Ok(AppSettings {
            hosting: self.section("Hosting")?,
            site_options: self.section("SiteOptions")?,
            data_options: self.section("DataOptions")?,
            security_options: self.section("SecurityOptions")?,
            form_options: self.section("FormOptions")?,
            mvc_options: self.section("MvcOptions")?,
        })
    }
}

fn read_layer(path: &Path) -> Result<Option<Value>, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn lookup<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let object = value.as_object()?;
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn merge_values(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                let existing = base
                    .keys()
                    .find(|k| k.eq_ignore_ascii_case(&key))
                    .cloned()
                    .unwrap_or(key);
                merge_values(base.entry(existing).or_insert(Value::Null), value);
            }
        }
        (base, layer) => *base = layer,
    }
}

fn set_path(root: &mut Value, segments: &[&str], value: Value) {
    let mut nested = value;
    for segment in segments.iter().rev() {
        let mut object = Map::new();
        object.insert((*segment).to_string(), nested);
        nested = Value::Object(object);
    }
    merge_values(root, nested);
}

fn parse_scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}
