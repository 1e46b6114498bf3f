//! Image upload pipeline.
//!
//! A linear state machine:
//!
//! | State       | Entered by                         | Left by                         |
//! |-------------|------------------------------------|---------------------------------|
//! | `Idle`      | start, any failure, completion     | [`UploadPipeline::pick`]        |
//! | `Picked`    | a granted, non-cancelled pick      | [`UploadPipeline::upload`]      |
//! | `Uploading` | `upload`                           | [`UploadPipeline::persist`]     |
//! | `Persisted` | a successful record write          | immediately back to `Idle`      |
//!
//! Objects are written to `{userId}/{epochMillis}.{ext}` with upsert. If the
//! record that should reference an uploaded object cannot be written, the
//! object is deleted again so the bucket holds no orphans.

pub mod picker;

use std::future::Future;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::SessionManager;
use crate::backend::ObjectStore;
use crate::error::{Error, Result};
use crate::images::ImageRepository;
use crate::models::{Image, Session, Word};
use crate::words::WordRepository;

pub use picker::{FileMediaPicker, MediaPicker, PermissionStatus, PickedAsset};

/// Extension used when neither the file name nor the media type tells.
pub const DEFAULT_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Picked,
    Uploading,
    Persisted,
}

/// An image ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedImage {
    /// Local preview location.
    pub uri: String,
    pub base64: Option<String>,
    /// Lower-case file extension without the dot.
    pub ext: String,
}

impl PickedImage {
    pub fn from_asset(asset: PickedAsset) -> Self {
        let ext = infer_extension(asset.file_name.as_deref(), asset.mime_type.as_deref());
        Self {
            uri: asset.uri,
            base64: asset.base64,
            ext,
        }
    }

    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.ext)
    }
}

/// An object written to the store but not yet referenced by any record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub path: String,
    pub public_url: String,
}

/// Extension from the file name, then from the media subtype, else `jpg`.
pub fn infer_extension(file_name: Option<&str>, mime_type: Option<&str>) -> String {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.trim());
    let from_mime = || {
        mime_type
            .and_then(|mime| mime.split_once('/'))
            .map(|(_, subtype)| subtype.trim())
    };
    from_name
        .filter(|ext| !ext.is_empty())
        .or_else(|| from_mime().filter(|ext| !ext.is_empty()))
        .unwrap_or(DEFAULT_EXTENSION)
        .to_lowercase()
}

pub fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}

pub struct UploadPipeline {
    picker: Arc<dyn MediaPicker>,
    objects: Arc<dyn ObjectStore>,
    state: watch::Sender<UploadState>,
}

impl UploadPipeline {
    pub fn new(picker: Arc<dyn MediaPicker>, objects: Arc<dyn ObjectStore>) -> Self {
        let (state, _) = watch::channel(UploadState::Idle);
        Self {
            picker,
            objects,
            state,
        }
    }

    pub fn state(&self) -> UploadState {
        *self.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<UploadState> {
        self.state.subscribe()
    }

    /// Asks for permission, then lets the user choose an image.
    ///
    /// Returns `None` if the user cancels.
    pub async fn pick(&self) -> Result<Option<PickedImage>> {
        self.state.send_replace(UploadState::Idle);
        match self.picker.request_permission().await {
            Ok(PermissionStatus::Granted) => {}
            Ok(PermissionStatus::Denied) => {
                return Err(Error::PermissionDenied(
                    "access to the photo library is required".into(),
                ));
            }
            Err(e) => return Err(e),
        }

        let Some(asset) = self.picker.launch().await? else {
            debug!("pick cancelled");
            return Ok(None);
        };
        let picked = PickedImage::from_asset(asset);
        self.state.send_replace(UploadState::Picked);
        Ok(Some(picked))
    }

    /// Decodes the picked image and writes it under the session user's folder.
    pub async fn upload(&self, session: &Session, picked: &PickedImage) -> Result<UploadedObject> {
        self.state.send_replace(UploadState::Uploading);
        let result = self.write_object(session, picked).await;
        if result.is_err() {
            self.state.send_replace(UploadState::Idle);
        }
        result
    }

    /// Runs `record` with the object's public URL. If it fails the object is
    /// removed again and the record error is returned.
    pub async fn persist<T, F, Fut>(
        &self,
        session: &Session,
        uploaded: UploadedObject,
        record: F,
    ) -> Result<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let result = record(uploaded.public_url.clone()).await;
        match &result {
            Ok(_) => {
                info!(path = %uploaded.path, "upload persisted");
                self.state.send_replace(UploadState::Persisted);
            }
            Err(e) => {
                warn!(path = %uploaded.path, error = %e, "record failed, removing uploaded object");
                if let Err(cleanup) = self.objects.remove(session, &uploaded.path).await {
                    warn!(path = %uploaded.path, error = %cleanup, "could not remove orphaned object");
                }
            }
        }
        self.state.send_replace(UploadState::Idle);
        result
    }

    /// Uploads `picked` and records it in the image table.
    pub async fn upload_image(&self, images: &ImageRepository, picked: &PickedImage) -> Result<Image> {
        let session = self.require_session(images.session()).await?;
        let uploaded = self.upload(&session, picked).await?;
        self.persist(&session, uploaded, |url| async move { images.create(&url).await })
            .await
    }

    /// Uploads `picked` and points word `word_id` at it.
    pub async fn attach_to_word(
        &self,
        words: &WordRepository,
        word_id: &str,
        picked: &PickedImage,
    ) -> Result<Word> {
        let session = self.require_session(words.session()).await?;
        let uploaded = self.upload(&session, picked).await?;
        self.persist(&session, uploaded, |url| async move {
            words.set_image(word_id, &url).await
        })
        .await
    }

    /// The caller's session. Without one the pipeline drops back to idle.
    async fn require_session(&self, manager: &SessionManager) -> Result<Session> {
        let result = manager.require_session().await;
        if result.is_err() {
            self.state.send_replace(UploadState::Idle);
        }
        result
    }

    async fn write_object(&self, session: &Session, picked: &PickedImage) -> Result<UploadedObject> {
        let encoded = picked
            .base64
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::Validation("picked image has no data".into()))?;
        let bytes = STANDARD.decode(encoded)?;

        let path = format!(
            "{}/{}.{}",
            session.user.id,
            Utc::now().timestamp_millis(),
            picked.ext
        );
        let size = bytes.len();
        self.objects
            .upload(session, &path, bytes, picked.content_type(), true)
            .await?;
        debug!(%path, size, "object uploaded");

        Ok(UploadedObject {
            public_url: self.objects.public_url(&path),
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_comes_from_the_file_name_first() {
        assert_eq!(infer_extension(Some("IMG_1.PNG"), Some("image/jpeg")), "png");
        assert_eq!(infer_extension(Some("a.b.heic"), None), "heic");
    }

    #[test]
    fn extension_falls_back_to_media_type_then_jpg() {
        assert_eq!(infer_extension(None, Some("image/png")), "png");
        assert_eq!(infer_extension(Some("no-dot"), Some("image/HEIC")), "heic");
        assert_eq!(infer_extension(Some("trailing."), None), "jpg");
        assert_eq!(infer_extension(None, None), "jpg");
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("png"), "image/png");
        assert_eq!(content_type_for("heic"), "image/heic");
        assert_eq!(content_type_for("jpg"), "image/jpeg");
        assert_eq!(content_type_for("webp"), "image/jpeg");
    }
}
