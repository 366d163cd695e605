use super::{Linkable, ResultLink, normalize_path};
use crate::error::{Result, SiteError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// Read access to the site's CMS content
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    async fn find_by_path(&self, path: &str) -> Option<Linkable>;

    /// The page configured as the destination for `link`, if the site has one
    async fn find_result_link(&self, link: ResultLink) -> Option<Linkable>;

    async fn all(&self) -> Vec<Linkable>;
}

/// Content store backed by a JSON array of pages
pub struct JsonContentStore {
    source: Option<PathBuf>,
    pages: DashMap<String, Linkable>,
    result_links: DashMap<ResultLink, String>,
}

impl JsonContentStore {
    /// Load pages from `path`. A missing file gives an empty site.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            source: Some(path.into()),
            pages: DashMap::new(),
            result_links: DashMap::new(),
        };
        store.reload()?;
        Ok(store)
    }

    pub fn from_pages(pages: impl IntoIterator<Item = Linkable>) -> Self {
        let store = Self {
            source: None,
            pages: DashMap::new(),
            result_links: DashMap::new(),
        };
        store.replace(pages.into_iter().collect());
        store
    }

    /// Re-read the source file. Returns the number of pages loaded.
    pub fn reload(&self) -> Result<usize> {
        let Some(source) = &self.source else {
            return Ok(self.pages.len());
        };
        let pages = read_pages(source)?;
        let count = pages.len();
        self.replace(pages);
        tracing::info!("Loaded {} pages from {}", count, source.display());
        Ok(count)
    }

    fn replace(&self, pages: Vec<Linkable>) {
        self.pages.clear();
        self.result_links.clear();
        for mut page in pages {
            page.path = normalize_path(&page.path);
            if let Some(link) = page.result_link {
                if let Some(previous) = self.result_links.insert(link, page.path.clone()) {
                    tracing::warn!(
                        "{} is configured on both {} and {}, using the latter",
                        link,
                        previous,
                        page.path
                    );
                }
            }
            self.pages.insert(page.path.clone(), page);
        }
    }
}

fn read_pages(path: &Path) -> Result<Vec<Linkable>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("No content file at {}, site has no pages", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&raw).map_err(|e| {
        SiteError::Internal(format!("Invalid content file {}: {}", path.display(), e))
    })
}

#[async_trait]
impl ContentStore for JsonContentStore {
    async fn find_by_path(&self, path: &str) -> Option<Linkable> {
        self.pages
            .get(&normalize_path(path))
            .map(|page| page.value().clone())
    }

    async fn find_result_link(&self, link: ResultLink) -> Option<Linkable> {
        let path = self.result_links.get(&link)?.value().clone();
        self.find_by_path(&path).await
    }

    async fn all(&self) -> Vec<Linkable> {
        let mut pages: Vec<Linkable> = self.pages.iter().map(|p| p.value().clone()).collect();
        pages.sort_by(|a, b| a.path.cmp(&b.path));
        pages
    }
}
