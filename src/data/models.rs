//! Data models
//!
//! Rust structs representing database entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A caption + image record
///
/// Posts are append-only: once inserted, no field changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Assigned by the database on insert
    pub id: i64,
    /// Trimmed, never empty
    pub caption: String,
    /// Public path, e.g. "/uploads/1700000000000000000.png"
    pub image_url: String,
    /// Server clock at insert time
    pub created_at: DateTime<Utc>,
}
