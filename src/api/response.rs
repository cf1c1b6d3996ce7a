//! Response helpers

use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AppError;

/// JSON body pretty-printed with two-space indentation and a trailing newline
#[derive(Debug, Clone)]
pub struct PrettyJson<T>(pub T);

impl<T: Serialize> IntoResponse for PrettyJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_string_pretty(&self.0) {
            Ok(mut body) => {
                body.push('\n');
                ([(header::CONTENT_TYPE, "application/json")], body).into_response()
            }
            Err(e) => AppError::Internal(e.into()).into_response(),
        }
    }
}
