use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::error::ApiResult;
use crate::middleware::{require_admin, require_auth};
use crate::rate_limit::limit_file_deletes;
use crate::uploads::{MAX_VIDEO_SIZE, UPLOADS_PREFIX};
use crate::{admin, comments, drafts, files, posts, uploads, users};

/// Full HTTP surface: the JSON API under `/api/v1` plus the media directory
/// under `/uploads`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}/comments", get(comments::list_comments))
        .route("/users/{id}/profile", get(users::get_profile))
        .route("/users/{id}/following", get(users::list_following))
        .route("/users/{id}/followers", get(users::list_followers))
        .route("/users/{id}/likes", get(users::list_liked_posts));

    let protected_routes = Router::new()
        .route("/auth/change-password", post(auth::change_password))
        .route("/posts", post(posts::create_post))
        .route("/posts/{id}", put(posts::update_post).delete(posts::delete_post))
        .route(
            "/posts/{id}/like",
            post(posts::like_post).delete(posts::unlike_post).get(posts::like_status),
        )
        .route("/posts/{id}/comments", post(comments::create_comment))
        .route("/posts/{id}/comments/{comment_id}", delete(comments::delete_comment))
        .route(
            "/posts/{id}/comments/{comment_id}/like",
            post(comments::like_comment).delete(comments::unlike_comment),
        )
        .route("/drafts", post(drafts::create_draft).get(drafts::list_drafts))
        .route(
            "/drafts/{id}",
            get(drafts::get_draft).put(drafts::save_draft).delete(drafts::delete_draft),
        )
        .route("/drafts/{id}/publish", post(drafts::publish_draft))
        .route("/users/profile", put(users::update_profile))
        .route("/users/{id}/follow", post(users::follow).delete(users::unfollow))
        .route(
            "/upload",
            post(uploads::upload_media).layer(DefaultBodyLimit::max(MAX_VIDEO_SIZE)),
        )
        .route(
            "/file/delete",
            post(files::delete_file)
                .layer(middleware::from_fn_with_state(state.clone(), limit_file_deletes)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/admin/stats", get(admin::stats))
        .route("/admin/posts/pending", get(admin::pending_posts))
        .route("/admin/posts/{id}/review", put(admin::review_post))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes);

    Router::new()
        .nest("/api/v1", api)
        .nest_service(UPLOADS_PREFIX, ServeDir::new(state.storage.dir()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.with_db(|db| db.ping()).await?;
    Ok(Json(json!({ "status": "ok" })))
}
