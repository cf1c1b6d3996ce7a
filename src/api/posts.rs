//! Post endpoints
//!
//! - `GET /api/posts` - newest posts
//! - `POST /api/posts` - multipart `caption` + `image`
//! - `GET /api/posts/{id}` - single post

use axum::{
    Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    middleware,
    routing::get,
};

use super::metrics::track_requests;
use super::response::PrettyJson;
use crate::AppState;
use crate::data::Post;
use crate::error::AppError;
use crate::service::{NewPost, PostService};
use crate::storage::{MAX_UPLOAD_BYTES, UploadedImage};

/// Create the posts router
pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/posts",
            get(list_posts)
                .post(create_post)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/posts/", get(missing_post_id).fallback(method_not_allowed))
        .route("/api/posts/*id", get(get_post).fallback(method_not_allowed))
        .route_layer(middleware::from_fn(track_requests))
}

fn post_service(state: &AppState) -> PostService {
    PostService::new(state.db.clone(), state.uploads.clone())
}

/// GET /api/posts
async fn list_posts(State(state): State<AppState>) -> Result<PrettyJson<Vec<Post>>, AppError> {
    let posts = post_service(&state).recent().await?;
    Ok(PrettyJson(posts))
}

/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<PrettyJson<Post>, AppError> {
    let multipart = multipart
        .map_err(|e| AppError::Validation(format!("Invalid multipart form: {}", e.body_text())))?;
    let form = read_post_form(multipart).await?;

    let post = post_service(&state).create(form).await?;
    Ok(PrettyJson(post))
}

/// GET /api/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<PrettyJson<Post>, AppError> {
    let id = parse_post_id(&raw_id)?;
    let post = post_service(&state).get(id).await?;
    Ok(PrettyJson(post))
}

/// GET /api/posts/
async fn missing_post_id() -> AppError {
    AppError::Validation("Missing id".to_string())
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Parse the path segment after `/api/posts/` as a positive id.
fn parse_post_id(raw: &str) -> Result<i64, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::Validation("Missing id".to_string()));
    }

    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::Validation("Invalid id".to_string())),
    }
}

fn multipart_error(error: MultipartError) -> AppError {
    let message = format!("Invalid multipart form: {}", error.body_text());
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message)
    } else {
        AppError::Validation(message)
    }
}

/// Drain the form, keeping the first plain `caption` and the first named `image` file.
///
/// The whole body is buffered (bounded by `MAX_UPLOAD_BYTES`) before any
/// validation happens, so a rejected form leaves nothing behind.
async fn read_post_form(mut multipart: Multipart) -> Result<NewPost, AppError> {
    let mut form = NewPost::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field
            .file_name()
            .filter(|file_name| !file_name.is_empty())
            .map(str::to_string);
        // A part with an empty filename is a plain value
        let is_file = file_name.is_some();

        match name.as_str() {
            "caption" if form.caption.is_none() && !is_file => {
                form.caption = Some(field.text().await.map_err(multipart_error)?);
            }
            "image" if form.image.is_none() => {
                let Some(file_name) = file_name else {
                    continue;
                };
                let data = field.bytes().await.map_err(multipart_error)?;
                form.image = Some(UploadedImage {
                    file_name,
                    data: data.to_vec(),
                });
            }
            _ => {}
        }
    }

    Ok(form)
}
