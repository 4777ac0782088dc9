use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use bluenote_db::{Database, DbError, models::UserRow};
use bluenote_types::api::{
    AuthResponse, ChangePasswordRequest, Claims, LoginRequest, RegisterRequest,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::rate_limit::UserRateLimiter;
use crate::storage::MediaStorage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub jwt_expire_hours: i64,
    pub storage: MediaStorage,
    /// Deadline for a single database call.
    pub db_timeout: Duration,
    pub file_delete_limiter: UserRateLimiter,
}

impl AppStateInner {
    /// Run a blocking database call off the async runtime, bounded by
    /// `db_timeout`. A missed deadline surfaces as `StorageUnavailable`.
    pub async fn with_db<F, T>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&Database) -> bluenote_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let task = tokio::task::spawn_blocking(move || f(&db));
        match tokio::time::timeout(self.db_timeout, task).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(e)) => Err(anyhow::anyhow!("database task panicked: {e}").into()),
            Err(_) => Err(DbError::StorageUnavailable(format!(
                "database call exceeded {} ms",
                self.db_timeout.as_millis()
            ))
            .into()),
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.trim().to_string();
    let name_len = username.chars().count();
    if !(3..=20).contains(&name_len) {
        return Err(ApiError::BadRequest("username must be 3 to 20 characters".into()));
    }
    validate_password(&req.password)?;
    let nickname = req
        .nickname
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(username.as_str())
        .to_string();

    let password_hash = hash_password(&req.password)?;

    let user = state
        .with_db(move |db| db.create_user(&username, &password_hash, &nickname))
        .await?;
    info!("Registered user {} ({})", user.username, user.id);

    let response = auth_response(&state, user)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let username = req.username.trim().to_string();
    let user = state
        .with_db(move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&user.password, &req.password)? {
        return Err(ApiError::Unauthorized);
    }

    Ok(Json(auth_response(&state, user)?))
}

/// POST /auth/change-password: the caller proves the old password and
/// picks a new one. Existing tokens stay valid until they expire.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    validate_password(&req.new_password)?;
    let user_id = claims.sub;
    let user = state.with_db(move |db| db.require_user(user_id)).await?;

    if !verify_password(&user.password, &req.old_password)? {
        return Err(ApiError::BadRequest("old password is incorrect".into()));
    }

    let password_hash = hash_password(&req.new_password)?;
    state
        .with_db(move |db| db.update_password(user_id, &password_hash))
        .await?;
    info!("User {} changed their password", user_id);
    Ok(StatusCode::NO_CONTENT)
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters".into()));
    }
    Ok(())
}

/// Hash with Argon2id and a fresh salt.
fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

fn verify_password(stored_hash: &str, password: &str) -> ApiResult<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is malformed: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn auth_response(state: &AppStateInner, user: UserRow) -> ApiResult<AuthResponse> {
    let (token, expires_at) = create_token(&state.jwt_secret, state.jwt_expire_hours, &user)?;
    Ok(AuthResponse {
        user_id: user.id,
        username: user.username,
        nickname: user.nickname,
        avatar: user.avatar,
        role: user.role,
        token,
        expires_at,
    })
}

pub fn create_token(
    secret: &str,
    expire_hours: i64,
    user: &UserRow,
) -> anyhow::Result<(String, DateTime<Utc>)> {
    let expires_at = Utc::now() + chrono::Duration::hours(expire_hours);
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        role: user.role,
        exp: usize::try_from(expires_at.timestamp())?,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, expires_at))
}
