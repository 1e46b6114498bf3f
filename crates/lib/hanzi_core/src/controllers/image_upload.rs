use tokio::sync::Mutex;
use tracing::info;

use super::record;
use crate::error::{Error, Result};
use crate::images::ImageRepository;
use crate::models::Image;
use crate::upload::{PickedImage, UploadPipeline};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageUploadState {
    pub picked: Option<PickedImage>,
    /// Set while an upload runs. A second upload is refused meanwhile.
    pub loading: bool,
    pub items: Vec<Image>,
    pub last_error: Option<String>,
}

/// Pick, upload and manage the user's images.
pub struct ImageUploadController {
    pipeline: UploadPipeline,
    images: ImageRepository,
    state: Mutex<ImageUploadState>,
}

impl ImageUploadController {
    pub fn new(pipeline: UploadPipeline, images: ImageRepository) -> Self {
        Self {
            pipeline,
            images,
            state: Mutex::new(ImageUploadState::default()),
        }
    }

    pub async fn snapshot(&self) -> ImageUploadState {
        self.state.lock().await.clone()
    }

    pub async fn refresh(&self) -> Result<()> {
        let result = self.images.list().await;
        let mut state = self.state.lock().await;
        let items = record(&mut state.last_error, result)?;
        state.items = items;
        Ok(())
    }

    /// Returns whether an image was picked. Cancelling keeps the previous pick.
    pub async fn pick(&self) -> Result<bool> {
        let result = self.pipeline.pick().await;
        let mut state = self.state.lock().await;
        match record(&mut state.last_error, result)? {
            Some(picked) => {
                state.picked = Some(picked);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Uploads the picked image, records it and refreshes the list.
    pub async fn upload(&self) -> Result<Image> {
        let picked = {
            let mut state = self.state.lock().await;
            if state.loading {
                return Err(Error::Validation("an upload is already in progress".into()));
            }
            let Some(picked) = state.picked.clone() else {
                return record(
                    &mut state.last_error,
                    Err(Error::Validation("no image selected".into())),
                );
            };
            state.loading = true;
            picked
        };

        let result = self.pipeline.upload_image(&self.images, &picked).await;
        let image = {
            let mut state = self.state.lock().await;
            state.loading = false;
            let image = record(&mut state.last_error, result)?;
            state.picked = None;
            image
        };
        info!(image_id = %image.id, "image uploaded");

        self.refresh().await?;
        Ok(image)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = self.images.delete(id).await;
        record(&mut self.state.lock().await.last_error, result)?;
        self.refresh().await
    }
}
