//! Media gallery and image uploads.

use std::sync::Arc;

use serde_json::{json, Map};

use super::collection::Collection;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{MediaItem, MediaType, NewMediaItem};
use crate::store::{collections, FileUpload, Filter, RecordStore};

/// Largest accepted image upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct MediaGalleryService {
    items: Collection<MediaItem>,
}

impl MediaGalleryService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            items: Collection::new(store, collections::MEDIA_GALLERY),
        }
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<MediaItem>> {
        self.items.get_all().await
    }

    pub async fn get_by_id(&self, id: &str) -> ServiceResult<Option<MediaItem>> {
        self.items.get_by_id(id).await
    }

    pub async fn get_featured(&self) -> ServiceResult<Vec<MediaItem>> {
        self.items.find_where(Filter::eq("is_featured", true)).await
    }

    pub async fn get_by_category(&self, category: &str) -> ServiceResult<Vec<MediaItem>> {
        self.items.find_where(Filter::eq("category", category)).await
    }

    pub async fn get_by_type(&self, media_type: MediaType) -> ServiceResult<Vec<MediaItem>> {
        self.items
            .find_where(Filter::eq("media_type", media_type.as_str()))
            .await
    }

    pub async fn create(&self, item: &NewMediaItem) -> ServiceResult<MediaItem> {
        self.items.create(item).await
    }

    pub async fn toggle_featured(&self, id: &str, is_featured: bool) -> ServiceResult<MediaItem> {
        self.items
            .update(id, &json!({ "is_featured": is_featured }))
            .await
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.items.delete(id).await
    }
}

#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn RecordStore>,
}

/// Reject anything that is not an image or exceeds [`MAX_UPLOAD_BYTES`].
pub fn validate_image(content_type: &str, size: usize) -> ServiceResult<()> {
    if !content_type.starts_with("image/") {
        return Err(ServiceError::InvalidUpload(
            "please select an image file".to_string(),
        ));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(ServiceError::InvalidUpload(
            "file size must be less than 10MB".to_string(),
        ));
    }
    Ok(())
}

impl UploadService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Store an image in `media_uploads` and return its public URL.
    pub async fn upload_image(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> ServiceResult<String> {
        validate_image(content_type, bytes.len())?;
        if filename.trim().is_empty() {
            return Err(ServiceError::InvalidUpload("missing file name".to_string()));
        }
        let size = bytes.len();
        let record = self
            .store
            .upload(
                collections::MEDIA_UPLOADS,
                FileUpload {
                    field: "file".to_string(),
                    filename: filename.to_string(),
                    content_type: content_type.to_string(),
                    bytes,
                    fields: Map::new(),
                },
            )
            .await?;
        // The store may rename the file on save.
        let stored = record.str_field("file").unwrap_or(filename);
        let url = self.store.file_url(&record, stored);
        log::info!("uploaded {stored} ({size} bytes) as {}", record.id);
        Ok(url)
    }

    pub async fn download(&self, collection: &str, id: &str, filename: &str) -> ServiceResult<Vec<u8>> {
        Ok(self.store.download(collection, id, filename).await?)
    }
}
