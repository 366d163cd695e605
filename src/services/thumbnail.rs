use crate::error::{Result, SiteError};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Requested thumbnail size, from `?w=&h=`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ThumbnailRequest {
    #[serde(rename = "w")]
    pub width: Option<u32>,
    #[serde(rename = "h")]
    pub height: Option<u32>,
}

impl ThumbnailRequest {
    pub fn is_resize(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Produces thumbnails for requested images
///
/// Platforms with an imaging stack bind their own generator in place of
/// [`PassthroughThumbnailGenerator`].
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync + 'static {
    async fn generate(&self, source: &Path, request: ThumbnailRequest) -> Result<Thumbnail>;
}

/// Serves the original image whatever size was asked for
#[derive(Debug, Clone, Default)]
pub struct PassthroughThumbnailGenerator;

#[async_trait]
impl ThumbnailGenerator for PassthroughThumbnailGenerator {
    async fn generate(&self, source: &Path, request: ThumbnailRequest) -> Result<Thumbnail> {
        let bytes = match tokio::fs::read(source).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SiteError::NotFound(source.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if request.is_resize() {
            tracing::debug!(
                "No resizing available, serving {} unscaled",
                source.display()
            );
        }
        Ok(Thumbnail {
            bytes,
            content_type: content_type_for(source),
        })
    }
}

pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Join a request path onto `root`, refusing anything that would leave it
pub fn media_path(root: &Path, requested: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(requested.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}
