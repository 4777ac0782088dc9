use axum::{
    Extension, Json,
    extract::{Path, State},
};

use bluenote_db::models::UserRow;
use bluenote_db::pagination::page_bounds;
use bluenote_db::parse_id;
use bluenote_types::api::{
    Claims, FollowResponse, PageQuery, PostListResponse, ProfileResponse, UpdateProfileRequest,
    UserListItem, UserListResponse,
};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{JsonBody, Query};
use crate::middleware::Viewer;
use crate::posts::post_response;

const MAX_NICKNAME_CHARS: usize = 20;
const MAX_BIO_CHARS: usize = 200;

fn list_item((user, is_following): (UserRow, bool)) -> UserListItem {
    UserListItem {
        user_id: user.id,
        username: user.username,
        nickname: user.nickname,
        avatar: user.avatar,
        bio: user.bio,
        is_following,
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ProfileResponse>> {
    let user_id = parse_id(&user_id, "user id")?;
    let viewer_id = viewer.id();

    let (user, stats, is_following) = state
        .with_db(move |db| {
            let user = db.require_user(user_id)?;
            let stats = db.user_stats(user_id)?;
            let is_following = match viewer_id {
                Some(v) if v != user_id => db.is_following(v, user_id)?,
                _ => false,
            };
            Ok((user, stats, is_following))
        })
        .await?;

    Ok(Json(ProfileResponse {
        user_id: user.id,
        username: user.username,
        nickname: user.nickname,
        avatar: user.avatar,
        bio: user.bio,
        role: user.role,
        follow_count: stats.follow_count,
        fans_count: stats.fans_count,
        like_count: stats.like_count,
        post_count: stats.post_count,
        is_following,
        created_at: user.created_at,
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let nickname = req.nickname.map(|n| n.trim().to_string());
    if let Some(n) = &nickname {
        let len = n.chars().count();
        if len == 0 || len > MAX_NICKNAME_CHARS {
            return Err(ApiError::BadRequest(format!(
                "nickname must be 1 to {MAX_NICKNAME_CHARS} characters"
            )));
        }
    }
    if req.bio.as_deref().is_some_and(|b| b.chars().count() > MAX_BIO_CHARS) {
        return Err(ApiError::BadRequest(format!(
            "bio must be at most {MAX_BIO_CHARS} characters"
        )));
    }

    let user_id = claims.sub;
    state
        .with_db(move |db| {
            db.update_profile(user_id, nickname.as_deref(), req.avatar.as_deref(), req.bio.as_deref())
        })
        .await?;

    get_profile(State(state), Viewer(Some(claims)), Path(user_id.to_string())).await
}

pub async fn follow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(target): Path<String>,
) -> ApiResult<Json<FollowResponse>> {
    let target = parse_id(&target, "user id")?;
    let user_id = claims.sub;
    let (follow_count, fans_count) = state.with_db(move |db| db.follow(user_id, target)).await?;
    Ok(Json(FollowResponse {
        following_user_id: target,
        following: true,
        follow_count,
        fans_count,
    }))
}

pub async fn unfollow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(target): Path<String>,
) -> ApiResult<Json<FollowResponse>> {
    let target = parse_id(&target, "user id")?;
    let user_id = claims.sub;
    let (follow_count, fans_count) = state.with_db(move |db| db.unfollow(user_id, target)).await?;
    Ok(Json(FollowResponse {
        following_user_id: target,
        following: false,
        follow_count,
        fans_count,
    }))
}

pub async fn list_following(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<UserListResponse>> {
    let user_id = parse_id(&user_id, "user id")?;
    let (page, limit) = page_bounds(query.page, query.limit);
    let viewer_id = viewer.id();
    let (list, total) = state
        .with_db(move |db| {
            db.require_user(user_id)?;
            db.list_following(user_id, viewer_id, page, limit)
        })
        .await?;
    Ok(Json(UserListResponse {
        total,
        list: list.into_iter().map(list_item).collect(),
    }))
}

pub async fn list_followers(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<UserListResponse>> {
    let user_id = parse_id(&user_id, "user id")?;
    let (page, limit) = page_bounds(query.page, query.limit);
    let viewer_id = viewer.id();
    let (list, total) = state
        .with_db(move |db| {
            db.require_user(user_id)?;
            db.list_followers(user_id, viewer_id, page, limit)
        })
        .await?;
    Ok(Json(UserListResponse {
        total,
        list: list.into_iter().map(list_item).collect(),
    }))
}

/// GET /users/{id}/likes: approved posts the user has liked.
pub async fn list_liked_posts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<PostListResponse>> {
    let user_id = parse_id(&user_id, "user id")?;
    let (page, limit) = page_bounds(query.page, query.limit);
    let (posts, total) = state
        .with_db(move |db| {
            db.require_user(user_id)?;
            db.liked_posts(user_id, page, limit)
        })
        .await?;
    Ok(Json(PostListResponse {
        total,
        list: posts.into_iter().map(post_response).collect(),
    }))
}
