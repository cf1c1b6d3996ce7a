//! Service layer
//!
//! Contains business logic separated from HTTP handlers.

mod post;

pub use post::{NewPost, PostService};
