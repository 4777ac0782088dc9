use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use bluenote_db::models::CommentRow;
use bluenote_db::pagination::CommentPageRequest;
use bluenote_db::{Database, DbError, parse_id};
use bluenote_types::api::{
    Claims, CommentListResponse, CommentQuery, CommentResponse, CreateCommentRequest,
};

use crate::auth::AppState;
use crate::error::ApiResult;
use crate::extract::{JsonBody, Query};

const MAX_COMMENT_CHARS: usize = 1000;

fn comment_response(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: row.id,
        post_id: row.post_id,
        user_id: row.user_id,
        username: row.username,
        nickname: row.nickname,
        avatar: row.avatar,
        content: row.content,
        created_at: row.created_at,
        updated_at: row.updated_at,
        likes: row.likes,
        score: row.score,
        is_author: row.is_author,
        is_admin: row.is_admin,
    }
}

fn validate_comment(content: &str) -> bluenote_db::Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(DbError::InvalidArgument("comment cannot be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(DbError::InvalidArgument(format!(
            "comment must be at most {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(content.to_string())
}

/// The comment must exist on `post_id`.
fn require_on_post(db: &Database, post_id: i64, comment_id: i64) -> bluenote_db::Result<()> {
    match db.get_comment(comment_id)? {
        Some(c) if c.post_id == post_id => Ok(()),
        _ => Err(DbError::NotFound("comment")),
    }
}

/// GET /posts/{id}/comments
///
/// Paging and sort parameters are coerced, never rejected; the response
/// echoes the values that were actually applied.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(query): Query<CommentQuery>,
) -> ApiResult<Json<CommentListResponse>> {
    let post_id = parse_id(&post_id, "post id")?;
    let req = CommentPageRequest::from_query(&query);
    let page = state.with_db(move |db| db.comments_page(post_id, &req)).await?;

    Ok(Json(CommentListResponse {
        comments: page.comments.into_iter().map(comment_response).collect(),
        total: page.total,
        page: page.request.page,
        page_size: page.request.page_size,
        sort_by: page.request.sort,
        order: page.request.order,
    }))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<String>,
    JsonBody(req): JsonBody<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let post_id = parse_id(&post_id, "post id")?;
    let content = validate_comment(&req.content)?;
    let user_id = claims.sub;

    let row = state
        .with_db(move |db| db.create_comment(post_id, user_id, &content, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(comment_response(row))))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let post_id = parse_id(&post_id, "post id")?;
    let comment_id = parse_id(&comment_id, "comment id")?;
    let user_id = claims.sub;
    state
        .with_db(move |db| db.delete_comment(post_id, comment_id, user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> ApiResult<Json<CommentResponse>> {
    let post_id = parse_id(&post_id, "post id")?;
    let comment_id = parse_id(&comment_id, "comment id")?;
    let user_id = claims.sub;
    let row = state
        .with_db(move |db| {
            require_on_post(db, post_id, comment_id)?;
            db.like_comment(comment_id, user_id, Utc::now())
        })
        .await?;
    Ok(Json(comment_response(row)))
}

pub async fn unlike_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> ApiResult<Json<CommentResponse>> {
    let post_id = parse_id(&post_id, "post id")?;
    let comment_id = parse_id(&comment_id, "comment id")?;
    let user_id = claims.sub;
    let row = state
        .with_db(move |db| {
            require_on_post(db, post_id, comment_id)?;
            db.unlike_comment(comment_id, user_id, Utc::now())
        })
        .await?;
    Ok(Json(comment_response(row)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_text_is_trimmed_and_bounded() {
        assert_eq!(validate_comment("  hi  ").unwrap(), "hi");
        assert!(matches!(validate_comment("   "), Err(DbError::InvalidArgument(_))));
        assert!(validate_comment(&"a".repeat(1000)).is_ok());
        assert!(validate_comment(&"a".repeat(1001)).is_err());
    }
}
