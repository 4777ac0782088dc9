pub mod admin;
pub mod auth;
pub mod cleanup;
pub mod comments;
pub mod drafts;
pub mod error;
pub mod extract;
pub mod files;
pub mod rate_limit;
pub mod middleware;
pub mod posts;
pub mod routes;
pub mod storage;
pub mod uploads;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use routes::router;
