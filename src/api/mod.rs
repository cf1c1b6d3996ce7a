//! API layer
//!
//! HTTP handlers for:
//! - Post API (JSON + multipart)
//! - Cross-origin policy
//! - Metrics (Prometheus)

mod cors;
pub mod metrics;
mod posts;
mod response;

pub use cors::allow_any_origin;
pub use metrics::metrics_router;
pub use posts::posts_router;
pub use response::PrettyJson;
