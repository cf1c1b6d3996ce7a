//! Upload storage module
//!
//! Handles image files on the local filesystem. The directory is also
//! served as static content at `/uploads`.

mod uploads;

pub use uploads::{
    MAX_UPLOAD_BYTES, PUBLIC_PREFIX, UploadStore, UploadedImage, file_extension, is_allowed_image,
};
