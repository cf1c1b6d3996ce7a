//! Local upload store
//!
//! Images are written under a single directory and served verbatim at
//! `/uploads/<name>`. File names are `<unix-nanos><ext>`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;
use crate::metrics::UPLOAD_BYTES_TOTAL;

/// Upper bound on a create request body and its parsed multipart buffer.
pub const MAX_UPLOAD_BYTES: usize = 10 << 20;

/// URL prefix under which stored files are served.
pub const PUBLIC_PREFIX: &str = "/uploads/";

const ALLOWED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".webp"];

const MAX_NAME_ATTEMPTS: usize = 16;

/// An image file field as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Client-supplied file name; only its extension is used
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Lowercased extension (including the dot) of the last path element, or "".
pub fn file_extension(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    base.rfind('.')
        .map(|idx| base[idx..].to_ascii_lowercase())
        .unwrap_or_default()
}

/// Extension-only check; the content itself is not inspected.
pub fn is_allowed_image(file_name: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&file_extension(file_name).as_str())
}

/// Directory-backed image store
pub struct UploadStore {
    root: PathBuf,
    /// Last stamp handed out, so names stay unique when the clock stalls
    last_stamp: AtomicU64,
}

impl UploadStore {
    /// Open the store, creating the directory (mode 0755) if needed.
    ///
    /// # Errors
    /// Returns `AppError::Storage` if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();

        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder.create(&root).map_err(|e| {
            AppError::Storage(format!(
                "failed to create upload directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self {
            root,
            last_stamp: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public path for a stored file name.
    pub fn public_url(name: &str) -> String {
        format!("{PUBLIC_PREFIX}{name}")
    }

    /// Validate and persist an uploaded image.
    ///
    /// # Returns
    /// The generated file name (not the public URL)
    ///
    /// # Errors
    /// - `AppError::UnsupportedMediaType` for extensions other than jpg/jpeg/png/webp
    /// - `AppError::Storage` if the file cannot be written
    pub async fn accept_upload(&self, image: &UploadedImage) -> Result<String, AppError> {
        if !is_allowed_image(&image.file_name) {
            return Err(AppError::UnsupportedMediaType(
                "Only JPG, PNG, WEBP images are allowed".to_string(),
            ));
        }
        let ext = file_extension(&image.file_name);

        let (name, mut file) = self.create_unique(&ext).await?;
        let path = self.root.join(&name);

        let written = async {
            file.write_all(&image.data).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial upload");
            }
            return Err(AppError::Storage(format!("Failed to save image: {}", e)));
        }

        UPLOAD_BYTES_TOTAL.inc_by(image.data.len() as f64);
        tracing::debug!(file = %name, bytes = image.data.len(), "Upload stored");

        Ok(name)
    }

    /// Remove a stored file by name.
    pub async fn remove(&self, name: &str) -> Result<(), AppError> {
        tokio::fs::remove_file(self.root.join(name))
            .await
            .map_err(|e| AppError::Storage(format!("Failed to remove {}: {}", name, e)))
    }

    async fn create_unique(&self, ext: &str) -> Result<(String, tokio::fs::File), AppError> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = format!("{}{}", self.next_stamp(), ext);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&name))
                .await
            {
                Ok(file) => return Ok((name, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(AppError::Storage(format!("Failed to save image: {}", e))),
            }
        }

        Err(AppError::Storage(
            "Failed to save image: could not allocate a unique file name".to_string(),
        ))
    }

    fn next_stamp(&self) -> u64 {
        let now = Utc::now()
            .timestamp_nanos_opt()
            .map(|nanos| nanos.max(0) as u64)
            .unwrap_or_default();

        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);

        now.max(previous + 1)
    }
}
