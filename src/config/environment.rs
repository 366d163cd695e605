use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumString};

/// Variable selecting the hosting environment
pub const ENVIRONMENT_VARIABLE: &str = "EASYWEB_ENVIRONMENT";

/// Variable overriding the content root
pub const CONTENT_ROOT_VARIABLE: &str = "EASYWEB_CONTENT_ROOT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum EnvironmentName {
    Development,
    Staging,
    Production,
}

/// The environment the site is hosted in and where its files live
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    name: EnvironmentName,
    content_root: PathBuf,
}

impl HostEnvironment {
    pub fn new(name: EnvironmentName, content_root: impl Into<PathBuf>) -> Self {
        Self {
            name,
            content_root: content_root.into(),
        }
    }

    /// Read `EASYWEB_ENVIRONMENT` and `EASYWEB_CONTENT_ROOT`.
    ///
    /// Unknown environment names fall back to production.
    pub fn from_env() -> Self {
        let name = match std::env::var(ENVIRONMENT_VARIABLE) {
            Ok(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    "Unknown environment '{}', falling back to {}",
                    value,
                    EnvironmentName::Production
                );
                EnvironmentName::Production
            }),
            Err(_) => EnvironmentName::Production,
        };

        let content_root = std::env::var(CONTENT_ROOT_VARIABLE)
            .map(PathBuf::from)
            .or_else(|_| std::env::current_dir())
            .unwrap_or_else(|_| PathBuf::from("."));

        Self::new(name, content_root)
    }

    pub fn name(&self) -> EnvironmentName {
        self.name
    }

    pub fn is_development(&self) -> bool {
        self.name == EnvironmentName::Development
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    /// Resolve a path relative to the content root
    pub fn content_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.content_root.join(relative)
    }

    pub fn web_root(&self) -> PathBuf {
        self.content_path("wwwroot")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_environment_name() {
        assert_eq!(
            "development".parse::<EnvironmentName>().unwrap(),
            EnvironmentName::Development
        );
        assert_eq!(EnvironmentName::Staging.to_string(), "Staging");
        assert!("qa".parse::<EnvironmentName>().is_err());
    }

    #[test]
    fn test_paths_are_relative_to_content_root() {
        let env = HostEnvironment::new(EnvironmentName::Development, "/srv/site");
        assert!(env.is_development());
        assert_eq!(env.web_root(), PathBuf::from("/srv/site/wwwroot"));
        assert_eq!(env.content_path("js"), PathBuf::from("/srv/site/js"));
    }
}
