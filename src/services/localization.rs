use crate::error::{Result, SiteError};
use std::collections::HashMap;
use std::path::Path;

/// Culture negotiated for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCulture(pub String);

/// JSON string tables, one `Resources/{culture}.json` per supported culture
#[derive(Debug, Clone)]
pub struct Localizer {
    cultures: Vec<String>,
    tables: HashMap<String, HashMap<String, String>>,
}

impl Localizer {
    pub fn load(resources: &Path, cultures: &[String]) -> Result<Self> {
        let mut tables = HashMap::new();
        for culture in cultures {
            let path = resources.join(format!("{}.json", culture));
            let table = match std::fs::read_to_string(&path) {
                Ok(raw) => serde_json::from_str::<HashMap<String, String>>(&raw).map_err(|e| {
                    SiteError::Internal(format!("Invalid resource file {}: {}", path.display(), e))
                })?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("No resource file for {}", culture);
                    HashMap::new()
                }
                Err(e) => return Err(e.into()),
            };
            tables.insert(culture.clone(), table);
        }
        Ok(Self::from_tables(cultures.to_vec(), tables))
    }

    pub fn from_tables(
        cultures: Vec<String>,
        tables: HashMap<String, HashMap<String, String>>,
    ) -> Self {
        let cultures = if cultures.is_empty() {
            vec!["en-US".to_string()]
        } else {
            cultures
        };
        Self { cultures, tables }
    }

    pub fn default_culture(&self) -> &str {
        &self.cultures[0]
    }

    pub fn cultures(&self) -> &[String] {
        &self.cultures
    }

    /// Pick the best supported culture for an `Accept-Language` header.
    ///
    /// Exact matches win over language-only matches; quality values order the
    /// candidates.
    pub fn negotiate(&self, accept_language: Option<&str>) -> String {
        let Some(header) = accept_language else {
            return self.default_culture().to_string();
        };

        let mut candidates: Vec<(&str, f32)> = header
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.trim().split(';');
                let tag = pieces.next()?.trim();
                if tag.is_empty() || tag == "*" {
                    return None;
                }
                let quality = pieces
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((tag, quality))
            })
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (tag, _) in &candidates {
            if let Some(exact) = self.cultures.iter().find(|c| c.eq_ignore_ascii_case(tag)) {
                return exact.clone();
            }
            let language = tag.split('-').next().unwrap_or(tag);
            if let Some(close) = self.cultures.iter().find(|c| {
                c.split('-')
                    .next()
                    .is_some_and(|l| l.eq_ignore_ascii_case(language))
            }) {
                return close.clone();
            }
        }
        self.default_culture().to_string()
    }

    /// Look `key` up for `culture`, then the default culture, then return the key itself
    pub fn translate(&self, culture: &str, key: &str) -> String {
        self.tables
            .get(culture)
            .and_then(|table| table.get(key))
            .or_else(|| {
                self.tables
                    .get(self.default_culture())
                    .and_then(|table| table.get(key))
            })
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}
