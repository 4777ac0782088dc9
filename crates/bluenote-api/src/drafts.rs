use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use bluenote_db::pagination::page_bounds;
use bluenote_db::parse_id;
use bluenote_types::api::{
    Claims, CreatePostRequest, PageQuery, PostListResponse, PostResponse, UpdatePostRequest,
};
use bluenote_types::models::PostStatus;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{JsonBody, Query};
use crate::posts::{new_post, post_response, validate_content, validate_title};

/// POST /drafts
pub async fn create_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_title(&req.title, false)?;
    let draft = new_post(req, PostStatus::Draft);
    let user_id = claims.sub;
    let row = state.with_db(move |db| db.save_draft(user_id, None, &draft)).await?;
    Ok((StatusCode::CREATED, Json(post_response(row))))
}

/// PUT /drafts/{id}: overwrite the whole draft.
pub async fn save_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<CreatePostRequest>,
) -> ApiResult<Json<PostResponse>> {
    let id = parse_id(&id, "draft id")?;
    validate_title(&req.title, false)?;
    let draft = new_post(req, PostStatus::Draft);
    let user_id = claims.sub;
    let row = state.with_db(move |db| db.save_draft(user_id, Some(id), &draft)).await?;
    Ok(Json(post_response(row)))
}

pub async fn list_drafts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<PostListResponse>> {
    let (page, limit) = page_bounds(query.page, query.limit);
    let user_id = claims.sub;
    let (drafts, total) = state.with_db(move |db| db.list_drafts(user_id, page, limit)).await?;
    Ok(Json(PostListResponse {
        total,
        list: drafts.into_iter().map(post_response).collect(),
    }))
}

pub async fn get_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<Json<PostResponse>> {
    let id = parse_id(&id, "draft id")?;
    let user_id = claims.sub;
    let row = state.with_db(move |db| db.get_draft(id, user_id)).await?;
    Ok(Json(post_response(row)))
}

pub async fn delete_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, "draft id")?;
    let user_id = claims.sub;
    state.with_db(move |db| db.delete_draft(id, user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /drafts/{id}/publish
///
/// The body is optional; when present its non-empty fields override the
/// draft before it goes to review. The published post needs a title and
/// content like any other post.
pub async fn publish_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<PostResponse>> {
    let id = parse_id(&id, "draft id")?;
    let overrides: UpdatePostRequest = if body.iter().all(u8::is_ascii_whitespace) {
        UpdatePostRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let user_id = claims.sub;
    let row = state
        .with_db(move |db| {
            let draft = db.get_draft(id, user_id)?;
            let pick = |over: &Option<String>, stored: &str| {
                over.as_deref()
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or(stored)
                    .to_string()
            };
            validate_title(&pick(&overrides.title, &draft.title), true)?;
            validate_content(&pick(&overrides.content, &draft.content))?;
            db.publish_draft(id, user_id, &overrides)
        })
        .await?;
    info!("User {} published draft {}", user_id, id);
    Ok(Json(post_response(row)))
}
