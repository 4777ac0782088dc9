use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use bluenote_types::api::{Claims, UploadResponse};
use bluenote_types::models::{MediaStatus, PostType};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// 50 MB limit for images
pub const MAX_IMAGE_SIZE: usize = 50 * 1024 * 1024;
/// 200 MB limit for videos
pub const MAX_VIDEO_SIZE: usize = 200 * 1024 * 1024;

/// Public URL prefix the media directory is served under.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Map an accepted content type to its media kind and file extension.
fn classify(content_type: &str) -> Option<(PostType, &'static str)> {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    match mime.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some((PostType::Image, "jpg")),
        "image/png" => Some((PostType::Image, "png")),
        "image/gif" => Some((PostType::Image, "gif")),
        "image/webp" => Some((PostType::Image, "webp")),
        "video/mp4" => Some((PostType::Video, "mp4")),
        "video/quicktime" => Some((PostType::Video, "mov")),
        "video/webm" => Some((PostType::Video, "webm")),
        _ => None,
    }
}

fn max_size(kind: PostType) -> usize {
    match kind {
        PostType::Image => MAX_IMAGE_SIZE,
        PostType::Video => MAX_VIDEO_SIZE,
    }
}

/// POST /upload: raw file bytes with the media type in `Content-Type`.
/// The file stays `temporary` until a post references its URL.
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    bytes: Bytes,
) -> ApiResult<impl IntoResponse> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let (kind, ext) = classify(content_type).ok_or_else(|| {
        ApiError::UnsupportedMediaType(format!("unsupported content type '{content_type}'"))
    })?;

    if bytes.is_empty() {
        return Err(ApiError::BadRequest("empty upload".into()));
    }
    if bytes.len() > max_size(kind) {
        return Err(ApiError::PayloadTooLarge(format!(
            "{kind} uploads are limited to {} MB",
            max_size(kind) / (1024 * 1024)
        )));
    }

    let id = Uuid::new_v4().to_string();
    let file_name = format!("{id}.{ext}");
    let size = i64::try_from(bytes.len()).map_err(anyhow::Error::from)?;

    // Write to disk before recording it
    state.storage.save(&file_name, &bytes).await?;

    let user_id = claims.sub;
    let (mid, fname) = (id.clone(), file_name.clone());
    let recorded = state
        .with_db(move |db| db.insert_media(&mid, user_id, &fname, kind, size))
        .await;
    if let Err(e) = recorded {
        if let Err(cleanup) = state.storage.delete(&file_name).await {
            error!("Failed to remove orphaned upload {}: {}", file_name, cleanup);
        }
        return Err(e);
    }

    info!("User {} uploaded {} ({} bytes)", user_id, file_name, size);
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id,
            url: format!("{UPLOADS_PREFIX}/{file_name}"),
            kind,
            size,
            status: MediaStatus::Temporary,
        }),
    ))
}
