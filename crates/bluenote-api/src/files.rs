use axum::{Extension, extract::State, http::StatusCode};
use tracing::info;

use bluenote_db::DbError;
use bluenote_types::api::{Claims, DeleteFileRequest};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;

/// Last path segment of a file reference, accepting bare names and
/// `/uploads/...` URLs alike.
fn file_name_of(file_path: &str) -> &str {
    file_path.trim().rsplit('/').next().unwrap_or_default()
}

/// POST /file/delete: remove one of the caller's uploads from disk and
/// forget it. Rate limited per user.
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<DeleteFileRequest>,
) -> ApiResult<StatusCode> {
    let file_name = file_name_of(&req.file_path).to_string();
    if file_name.is_empty() {
        return Err(ApiError::BadRequest("filePath is required".into()));
    }

    let media = state
        .with_db(move |db| db.media_by_file_name(&file_name))
        .await?
        .ok_or(DbError::NotFound("file"))?;
    if media.user_id != claims.sub {
        return Err(ApiError::Forbidden("not allowed to delete this file".into()));
    }

    // The row is only dropped once the file is gone.
    state.storage.delete(&media.file_name).await?;
    let id = media.id.clone();
    state.with_db(move |db| db.delete_media(&id)).await?;

    info!("User {} deleted file {}", claims.sub, media.file_name);
    Ok(StatusCode::NO_CONTENT)
}
