//! Media picker seam.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::error::Result;

/// Answer to a media-library permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// A single image chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedAsset {
    /// Local preview location.
    pub uri: String,
    /// Inline content, base64 encoded.
    pub base64: Option<String>,
    pub file_name: Option<String>,
    /// Declared media type, e.g. `image/png`.
    pub mime_type: Option<String>,
}

/// Device media library.
#[async_trait]
pub trait MediaPicker: Send + Sync {
    async fn request_permission(&self) -> Result<PermissionStatus>;

    /// Lets the user pick one image. `None` means the user cancelled.
    async fn launch(&self) -> Result<Option<PickedAsset>>;
}

/// Picks a file from disk. Used by the command line, where the "library" is
/// whatever path the user passed.
#[derive(Debug, Clone)]
pub struct FileMediaPicker {
    path: PathBuf,
}

impl FileMediaPicker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MediaPicker for FileMediaPicker {
    async fn request_permission(&self) -> Result<PermissionStatus> {
        Ok(PermissionStatus::Granted)
    }

    async fn launch(&self) -> Result<Option<PickedAsset>> {
        let bytes = tokio::fs::read(&self.path).await?;
        debug!(path = %self.path.display(), size = bytes.len(), "picked file");
        Ok(Some(PickedAsset {
            uri: format!("file://{}", self.path.display()),
            base64: Some(STANDARD.encode(bytes)),
            file_name: self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            mime_type: None,
        }))
    }
}
