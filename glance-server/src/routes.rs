use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use base64::{prelude::BASE64_STANDARD, Engine};
use glance_core::MAX_LENGTH_LIMIT;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::{
    error::ApiError,
    gallery::{Gallery, GalleryEntry},
    page,
    shell::Shell,
};

/// Largest request body accepted, enough for a full-size photo.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub shell: Shell,
    pub gallery: Option<Arc<Gallery>>,
    pub client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
pub struct CaptionRequest {
    /// Base64 image, optionally as a `data:` URL.
    pub image: Option<String>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CaptionResponse {
    pub caption: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/caption", post(caption_upload))
        .route("/v1/captions", post(caption_json))
        .route("/examples", get(list_examples))
        .route("/examples/{index}", post(select_example))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

fn decode_upload(bytes: &[u8]) -> Result<DynamicImage, ApiError> {
    image::load_from_memory(bytes)
        .map_err(|e| ApiError::BadRequest(format!("could not decode image: {e}")))
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let examples = state.gallery.as_ref().map(|gallery| gallery.entries());
    Html(page::render(examples.as_deref()))
}

async fn health() -> &'static str {
    "ok"
}

/// Browser form submission: a multipart body with an `image` file field.
async fn caption_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<CaptionResponse>, ApiError> {
    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        // Browsers send an empty part when no file was picked.
        if !bytes.is_empty() {
            debug!(bytes = bytes.len(), "received upload");
            image = Some(decode_upload(&bytes)?);
        }
    }

    let caption = state
        .shell
        .submit_blocking(image, state.shell.max_length())
        .await?;
    Ok(Json(CaptionResponse { caption }))
}

async fn caption_json(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CaptionRequest>,
) -> Result<Json<CaptionResponse>, ApiError> {
    if let Some(max_length) = req.max_length.filter(|&max_length| max_length > MAX_LENGTH_LIMIT) {
        return Err(ApiError::BadRequest(format!(
            "max_length {max_length} exceeds the limit of {MAX_LENGTH_LIMIT}"
        )));
    }
    let image = match req.image.as_deref().filter(|data| !data.is_empty()) {
        Some(data) => {
            let encoded = data
                .split_once(";base64,")
                .map_or(data, |(_, encoded)| encoded);
            let bytes = BASE64_STANDARD
                .decode(encoded)
                .map_err(|e| ApiError::BadRequest(format!("invalid base64 image: {e}")))?;
            Some(decode_upload(&bytes)?)
        }
        None => None,
    };
    let max_length = req.max_length.or(state.shell.max_length());

    let caption = state.shell.submit_blocking(image, max_length).await?;
    Ok(Json(CaptionResponse { caption }))
}

async fn list_examples(State(state): State<Arc<AppState>>) -> Json<Vec<GalleryEntry>> {
    Json(
        state
            .gallery
            .as_ref()
            .map(|gallery| gallery.entries())
            .unwrap_or_default(),
    )
}

async fn select_example(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<CaptionResponse>, ApiError> {
    let gallery = state
        .gallery
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("examples are disabled".to_string()))?;
    if gallery.url(index).is_none() {
        return Err(ApiError::NotFound(format!("no example image at index {index}")));
    }
    let caption = gallery.select(index, &state.shell, &state.client).await?;
    Ok(Json(CaptionResponse { caption }))
}
