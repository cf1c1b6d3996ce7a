//! Data layer module
//!
//! Handles post persistence in the relational store.

mod database;
mod models;

pub use database::{Database, RECENT_POSTS_LIMIT};
pub use models::Post;
