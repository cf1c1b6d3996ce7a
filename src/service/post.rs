//! Post service
//!
//! Orchestrates the upload store and the database for post creation,
//! listing, and lookup.

use std::sync::Arc;

use crate::data::{Database, Post, RECENT_POSTS_LIMIT};
use crate::error::AppError;
use crate::metrics::{POSTS_CREATED_TOTAL, UPLOADS_REJECTED_TOTAL};
use crate::storage::{UploadStore, UploadedImage};

/// Raw create-form input, before validation
#[derive(Debug, Default)]
pub struct NewPost {
    pub caption: Option<String>,
    pub image: Option<UploadedImage>,
}

/// Post service
pub struct PostService {
    db: Arc<Database>,
    uploads: Arc<UploadStore>,
}

impl PostService {
    /// Create new post service
    pub fn new(db: Arc<Database>, uploads: Arc<UploadStore>) -> Self {
        Self { db, uploads }
    }

    /// Most recent posts, newest first
    pub async fn recent(&self) -> Result<Vec<Post>, AppError> {
        self.db
            .list_recent_posts(RECENT_POSTS_LIMIT)
            .await
            .map_err(|e| e.database_context("DB query error"))
    }

    /// Single post by id
    pub async fn get(&self, id: i64) -> Result<Post, AppError> {
        self.db
            .get_post(id)
            .await
            .map_err(|e| e.database_context("DB error"))
    }

    /// Validate the form, store the image, then insert the record.
    ///
    /// # Errors
    /// - `AppError::Validation` if the trimmed caption is empty or the image is missing
    /// - `AppError::UnsupportedMediaType` if the image extension is not accepted
    /// - `AppError::Storage` if the image cannot be written or the insert fails
    ///
    /// When the insert definitely fails, the already-written image is removed
    /// again. After a timeout the image is kept, since the row may exist.
    pub async fn create(&self, form: NewPost) -> Result<Post, AppError> {
        let caption = form.caption.as_deref().map(str::trim).unwrap_or_default();
        if caption.is_empty() {
            UPLOADS_REJECTED_TOTAL.with_label_values(&["caption"]).inc();
            return Err(AppError::Validation("Caption is required".to_string()));
        }

        let Some(image) = form.image else {
            UPLOADS_REJECTED_TOTAL.with_label_values(&["image"]).inc();
            return Err(AppError::Validation("Image is required".to_string()));
        };

        let file_name = match self.uploads.accept_upload(&image).await {
            Ok(name) => name,
            Err(error) => {
                if matches!(error, AppError::UnsupportedMediaType(_)) {
                    UPLOADS_REJECTED_TOTAL.with_label_values(&["extension"]).inc();
                    tracing::info!(file_name = %image.file_name, "Rejected upload with unsupported extension");
                }
                return Err(error);
            }
        };
        let image_url = UploadStore::public_url(&file_name);

        let post = match self.db.insert_post(caption, &image_url).await {
            Ok(post) => post,
            Err(error) => {
                // A timed-out insert may still commit, so its image has to stay
                if matches!(error, AppError::Database(_)) {
                    if let Err(cleanup) = self.uploads.remove(&file_name).await {
                        tracing::warn!(error = %cleanup, file = %file_name, "Failed to remove orphaned upload");
                    }
                } else {
                    tracing::warn!(%error, file = %file_name, "Insert outcome unknown; keeping upload");
                }
                return Err(error.database_context("DB insert error"));
            }
        };

        POSTS_CREATED_TOTAL.inc();
        tracing::info!(post_id = post.id, image_url = %post.image_url, "Post created");

        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Connection;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn service() -> (PostService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let url = format!(
            "sqlite:{}?mode=rwc",
            temp_dir.path().join("test.db").display()
        );
        let db = Database::connect(&url, 5, Duration::from_secs(5))
            .await
            .unwrap();
        let uploads = UploadStore::open(temp_dir.path().join("uploads")).unwrap();
        (PostService::new(Arc::new(db), Arc::new(uploads)), temp_dir)
    }

    fn form(caption: &str, file_name: &str) -> NewPost {
        NewPost {
            caption: Some(caption.to_string()),
            image: Some(UploadedImage {
                file_name: file_name.to_string(),
                data: vec![0xFF, 0xD8, 0xFF],
            }),
        }
    }

    fn stored_files(temp_dir: &TempDir) -> usize {
        std::fs::read_dir(temp_dir.path().join("uploads"))
            .unwrap()
            .count()
    }

    #[tokio::test]
    async fn create_trims_caption() {
        let (service, _temp_dir) = service().await;

        let post = service.create(form("  Hello  ", "a.jpg")).await.unwrap();
        assert_eq!(post.caption, "Hello");
        assert!(post.image_url.starts_with("/uploads/"));
        assert!(post.image_url.ends_with(".jpg"));

        let fetched = service.get(post.id).await.unwrap();
        assert_eq!(fetched.caption, "Hello");
        assert_eq!(fetched.image_url, post.image_url);
    }

    #[tokio::test]
    async fn create_rejects_blank_caption() {
        let (service, temp_dir) = service().await;

        let error = service.create(form(" \t\n ", "a.jpg")).await.unwrap_err();
        assert!(matches!(error, AppError::Validation(message) if message == "Caption is required"));
        assert_eq!(stored_files(&temp_dir), 0);
    }

    #[tokio::test]
    async fn create_requires_image() {
        let (service, _temp_dir) = service().await;

        let error = service
            .create(NewPost {
                caption: Some("caption".to_string()),
                image: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Validation(message) if message == "Image is required"));
    }

    #[tokio::test]
    async fn create_rejects_gif_without_side_effects() {
        let (service, temp_dir) = service().await;

        let error = service.create(form("cat", "cat.gif")).await.unwrap_err();
        assert!(matches!(error, AppError::UnsupportedMediaType(_)));
        assert_eq!(stored_files(&temp_dir), 0);
        assert!(service.recent().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_insert_removes_stored_image() {
        let (service, temp_dir) = service().await;
        service.db.close().await;

        let error = service.create(form("orphan", "a.png")).await.unwrap_err();
        assert!(matches!(error, AppError::Storage(message) if message.starts_with("DB insert error")));
        assert_eq!(stored_files(&temp_dir), 0);
    }

    #[tokio::test]
    async fn timed_out_insert_keeps_stored_image() {
        let temp_dir = TempDir::new().unwrap();
        let url = format!(
            "sqlite:{}?mode=rwc",
            temp_dir.path().join("test.db").display()
        );
        let db = Database::connect(&url, 5, Duration::from_millis(300))
            .await
            .unwrap();
        let uploads = UploadStore::open(temp_dir.path().join("uploads")).unwrap();
        let service = PostService::new(Arc::new(db), Arc::new(uploads));

        // Hold the write lock so the insert waits past its deadline
        let mut blocker = sqlx::SqliteConnection::connect(&url).await.unwrap();
        let mut tx = blocker.begin().await.unwrap();
        sqlx::query("INSERT INTO posts (image_url, caption) VALUES ('/uploads/held.png', 'held')")
            .execute(&mut *tx)
            .await
            .unwrap();

        let error = service.create(form("slow", "a.png")).await.unwrap_err();
        assert!(matches!(error, AppError::Timeout(_)));
        assert_eq!(stored_files(&temp_dir), 1);

        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (service, _temp_dir) = service().await;

        let error = service.get(42).await.unwrap_err();
        assert!(matches!(error, AppError::NotFound(_)));
    }
}
