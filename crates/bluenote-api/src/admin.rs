use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;

use bluenote_db::pagination::{PostFilter, page_bounds};
use bluenote_db::parse_id;
use bluenote_types::api::{
    Claims, PageQuery, PostListResponse, PostResponse, ReviewPostRequest, StatsResponse, TagStat,
};
use bluenote_types::models::PostStatus;

use crate::auth::AppState;
use crate::error::ApiResult;
use crate::extract::{JsonBody, Query};
use crate::posts::post_response;

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let stats = state.with_db(|db| db.site_stats()).await?;
    Ok(Json(StatsResponse {
        total_users: stats.total_users,
        total_posts: stats.total_posts,
        pending_posts: stats.pending_posts,
        total_comments: stats.total_comments,
        tag_stats: stats
            .tags
            .into_iter()
            .map(|(tag, count)| TagStat { tag, count })
            .collect(),
    }))
}

/// Review queue, newest first.
pub async fn pending_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<PostListResponse>> {
    let (page, limit) = page_bounds(query.page, query.limit);
    let filter = PostFilter { status: Some(PostStatus::Pending), ..Default::default() };
    let (posts, total) = state
        .with_db(move |db| db.list_posts(&filter, None, page, limit))
        .await?;
    Ok(Json(PostListResponse {
        total,
        list: posts.into_iter().map(post_response).collect(),
    }))
}

pub async fn review_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<ReviewPostRequest>,
) -> ApiResult<Json<PostResponse>> {
    let id = parse_id(&id, "post id")?;
    let reason = req.reason.filter(|r| !r.trim().is_empty());
    let status = req.status;
    let row = state
        .with_db(move |db| db.review_post(id, status, reason.as_deref()))
        .await?;
    info!("Admin {} marked post {} {}", claims.username, id, status);
    Ok(Json(post_response(row)))
}
