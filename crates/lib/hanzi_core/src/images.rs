//! Image repository over the `vocab_images` table.

use std::sync::Arc;

use tracing::info;

use crate::auth::SessionManager;
use crate::backend::ImageStore;
use crate::error::{Error, Result};
use crate::models::Image;
use crate::words::require_id;

#[derive(Clone)]
pub struct ImageRepository {
    session: Arc<SessionManager>,
    store: Arc<dyn ImageStore>,
}

impl ImageRepository {
    pub fn new(session: Arc<SessionManager>, store: Arc<dyn ImageStore>) -> Self {
        Self { session, store }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Records an already-stored object.
    pub async fn create(&self, image_url: &str) -> Result<Image> {
        let image_url = image_url.trim();
        if image_url.is_empty() {
            return Err(Error::Validation("image_url is required".into()));
        }
        let session = self.session.require_session().await?;
        let image = self.store.insert_image(&session, image_url).await?;
        info!(image_id = %image.id, "image recorded");
        Ok(image)
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<Image>> {
        let session = self.session.require_session().await?;
        self.store.select_images(&session).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = require_id(id)?;
        let session = self.session.require_session().await?;
        self.store.delete_image(&session, id).await?;
        info!(image_id = %id, "image deleted");
        Ok(())
    }
}
