use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::info;

use bluenote_db::models::{NewPost, PostRow};
use bluenote_db::pagination::{PostCursorRequest, PostFilter, page_bounds};
use bluenote_db::{DbError, parse_id};
use bluenote_types::api::{
    Claims, CreatePostRequest, CursorPostResponse, LikeStatusResponse, PostListQuery,
    PostListResponse, PostResponse, UpdatePostRequest,
};
use bluenote_types::models::PostStatus;

use crate::auth::AppState;
use crate::error::ApiResult;
use crate::extract::{JsonBody, Query};
use crate::middleware::Viewer;

const MAX_TITLE_CHARS: usize = 100;

pub(crate) fn post_response(row: PostRow) -> PostResponse {
    let cover_image = if row.cover_image.is_empty() {
        row.files.first().cloned().unwrap_or_default()
    } else {
        row.cover_image
    };
    PostResponse {
        id: row.id,
        title: row.title,
        content: row.content,
        post_type: row.post_type,
        tags: row.tags,
        files: row.files,
        cover_image,
        status: row.status,
        reject_reason: row.reject_reason,
        user_id: row.user_id,
        username: row.username,
        nickname: row.nickname,
        avatar: row.avatar,
        likes: row.likes,
        comments: row.comments,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub(crate) fn validate_title(title: &str, required: bool) -> bluenote_db::Result<()> {
    let len = title.trim().chars().count();
    if required && len == 0 {
        return Err(DbError::InvalidArgument("title is required".into()));
    }
    if len > MAX_TITLE_CHARS {
        return Err(DbError::InvalidArgument(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

pub(crate) fn validate_content(content: &str) -> bluenote_db::Result<()> {
    if content.trim().is_empty() {
        return Err(DbError::InvalidArgument("content is required".into()));
    }
    Ok(())
}

pub(crate) fn new_post(req: CreatePostRequest, status: PostStatus) -> NewPost {
    NewPost {
        title: req.title.trim().to_string(),
        content: req.content,
        post_type: req.post_type,
        tags: req.tags,
        files: req.files,
        cover_image: req.cover_image.unwrap_or_default(),
        status,
    }
}

/// GET /posts: cursor pagination when `cursor` is present, offset
/// pagination otherwise. Both list approved posts unless `status` is given.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> ApiResult<Response> {
    if query.cursor.is_some() {
        let req = PostCursorRequest::from_query(&query)?;
        let page = state.with_db(move |db| db.posts_by_cursor(&req)).await?;
        return Ok(Json(CursorPostResponse {
            posts: page.posts.into_iter().map(post_response).collect(),
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        })
        .into_response());
    }

    let filter = PostFilter::from_query(&query)?;
    let (page, limit) = page_bounds(query.page, query.limit);
    let (posts, total) = state
        .with_db(move |db| db.list_posts(&filter, Some(PostStatus::Approved), page, limit))
        .await?;
    Ok(Json(PostListResponse {
        total,
        list: posts.into_iter().map(post_response).collect(),
    })
    .into_response())
}

/// Non-approved posts are visible only to their author and to admins.
pub async fn get_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> ApiResult<Json<PostResponse>> {
    let id = parse_id(&id, "post id")?;
    let post = state
        .with_db(move |db| db.get_post(id))
        .await?
        .ok_or(DbError::NotFound("post"))?;

    let visible = post.status == PostStatus::Approved
        || viewer.id() == Some(post.user_id)
        || viewer.is_admin();
    if !visible {
        return Err(DbError::NotFound("post").into());
    }
    Ok(Json(post_response(post)))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_title(&req.title, true)?;
    validate_content(&req.content)?;
    let status = if req.is_draft { PostStatus::Draft } else { PostStatus::Pending };
    let post = new_post(req, status);

    let user_id = claims.sub;
    let row = state.with_db(move |db| db.create_post(user_id, &post)).await?;
    info!("User {} created post {} ({})", user_id, row.id, row.status);
    Ok((StatusCode::CREATED, Json(post_response(row))))
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdatePostRequest>,
) -> ApiResult<Json<PostResponse>> {
    let id = parse_id(&id, "post id")?;
    if let Some(title) = &req.title {
        validate_title(title, false)?;
    }
    let user_id = claims.sub;
    let row = state.with_db(move |db| db.update_post(id, user_id, &req)).await?;
    Ok(Json(post_response(row)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, "post id")?;
    let user_id = claims.sub;
    state.with_db(move |db| db.delete_post(id, user_id)).await?;
    info!("User {} deleted post {}", user_id, id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<Json<LikeStatusResponse>> {
    let id = parse_id(&id, "post id")?;
    let user_id = claims.sub;
    let likes = state.with_db(move |db| db.like_post(id, user_id)).await?;
    Ok(Json(LikeStatusResponse { liked: true, likes }))
}

pub async fn unlike_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<Json<LikeStatusResponse>> {
    let id = parse_id(&id, "post id")?;
    let user_id = claims.sub;
    let likes = state.with_db(move |db| db.unlike_post(id, user_id)).await?;
    Ok(Json(LikeStatusResponse { liked: false, likes }))
}

pub async fn like_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<Json<LikeStatusResponse>> {
    let id = parse_id(&id, "post id")?;
    let user_id = claims.sub;
    let (liked, likes) = state.with_db(move |db| db.post_like_status(id, user_id)).await?;
    Ok(Json(LikeStatusResponse { liked, likes }))
}
