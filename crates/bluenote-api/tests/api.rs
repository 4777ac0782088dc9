use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use bluenote_api::rate_limit::{self, FILE_DELETES_PER_MINUTE};
use bluenote_api::storage::MediaStorage;
use bluenote_api::{AppStateInner, router};
use bluenote_db::Database;

struct TestApp {
    app: Router,
    media_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.media_dir).ok();
    }
}

async fn test_app() -> TestApp {
    let media_dir = std::env::temp_dir().join(format!("bluenote-api-{}", uuid::Uuid::new_v4()));
    let state = Arc::new(AppStateInner {
        db: Arc::new(Database::open_in_memory().unwrap()),
        jwt_secret: "integration-test-secret".into(),
        jwt_expire_hours: 1,
        storage: MediaStorage::new(media_dir.clone()).await.unwrap(),
        db_timeout: Duration::from_secs(5),
        file_delete_limiter: rate_limit::per_minute(FILE_DELETES_PER_MINUTE),
    });
    TestApp { app: router(state), media_dir }
}

impl TestApp {
    async fn raw(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let (status, bytes) = self.raw(builder.body(body).unwrap()).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register(&self, username: &str) -> (i64, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "username": username, "password": "correct horse" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (body["userId"].as_i64().unwrap(), body["token"].as_str().unwrap().to_string())
    }

    async fn approved_post(&self, author: &str, admin: &str, title: &str) -> i64 {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/posts",
                Some(author),
                Some(json!({ "title": title, "content": "body", "type": "image", "tags": ["travel"] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["id"].as_i64().unwrap();
        let (status, _) = self
            .call(
                Method::PUT,
                &format!("/api/v1/admin/posts/{id}/review"),
                Some(admin),
                Some(json!({ "status": "approved" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        id
    }
}

#[tokio::test]
async fn registration_and_login() {
    let app = test_app().await;
    let (_, _) = app.register("alice").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "username": "alice", "password": "another one" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "username": "al", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = test_app().await;
    let (_, admin) = app.register("alice").await;
    let (_, user) = app.register("bob").await;

    let new_post = json!({ "title": "t", "content": "c", "type": "image" });
    let (status, body) = app.call(Method::POST, "/api/v1/posts", None, Some(new_post.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "missing or invalid token" }));

    let (status, _) = app
        .call(Method::POST, "/api/v1/posts", Some("not-a-jwt"), Some(new_post))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call(Method::GET, "/api/v1/admin/stats", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::GET, "/api/v1/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalUsers"], 2);
}

#[tokio::test]
async fn cursor_listing_walks_approved_posts() {
    let app = test_app().await;
    let (_, admin) = app.register("alice").await;
    let (_, bob) = app.register("bob").await;

    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(app.approved_post(&bob, &admin, &format!("post {i}")).await);
    }
    // Pending posts stay out of the public listing.
    app.call(
        Method::POST,
        "/api/v1/posts",
        Some(&bob),
        Some(json!({ "title": "waiting", "content": "c", "type": "video" })),
    )
    .await;

    let (status, first) = app.call(Method::GET, "/api/v1/posts?cursor=&limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let page_ids: Vec<i64> = first["posts"].as_array().unwrap().iter().map(|p| p["id"].as_i64().unwrap()).collect();
    assert_eq!(page_ids, vec![ids[2], ids[1]]);
    assert_eq!(first["hasMore"], true);
    assert_eq!(first["nextCursor"], ids[1].to_string());
    assert_eq!(first["posts"][0]["tags"], json!(["travel"]));

    let uri = format!("/api/v1/posts?cursor={}&limit=2", ids[1]);
    let (_, second) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(second["posts"].as_array().unwrap().len(), 1);
    assert_eq!(second["hasMore"], false);
    assert_eq!(second["nextCursor"], "");

    let (status, body) = app.call(Method::GET, "/api/v1/posts?cursor=abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("cursor"));

    let (status, offset) = app.call(Method::GET, "/api/v1/posts?page=1&limit=10", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(offset["total"], 3);
}

#[tokio::test]
async fn comments_are_paged_and_scored() {
    let app = test_app().await;
    let (_, admin) = app.register("alice").await;
    let (_, bob) = app.register("bob").await;
    let (_, carol) = app.register("carol").await;
    let post = app.approved_post(&bob, &admin, "hello").await;

    let comments_uri = format!("/api/v1/posts/{post}/comments");
    let mut comment_ids = Vec::new();
    for (token, text) in [(&bob, "by author"), (&carol, "by carol"), (&admin, "by admin")] {
        let (status, body) = app
            .call(Method::POST, &comments_uri, Some(token), Some(json!({ "content": text })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        comment_ids.push(body["id"].as_i64().unwrap());
    }

    let (status, _) = app
        .call(Method::POST, &comments_uri, Some(&carol), Some(json!({ "content": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let like_uri = format!("{comments_uri}/{}/like", comment_ids[1]);
    let (status, liked) = app.call(Method::POST, &like_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(liked["likes"], 1);
    let (status, _) = app.call(Method::POST, &like_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, page) = app
        .call(Method::GET, &format!("{comments_uri}?sortBy=likes&order=desc&page=0&pageSize=0"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["page"], 1);
    assert_eq!(page["pageSize"], 1);
    assert_eq!(page["sortBy"], "likes");
    assert_eq!(page["comments"][0]["id"], comment_ids[1]);

    let (_, page) = app.call(Method::GET, &format!("{comments_uri}?sortBy=bogus"), None, None).await;
    assert_eq!(page["sortBy"], "score");
    assert_eq!(page["order"], "desc");
    let flags: Vec<(bool, bool)> = page["comments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| (c["isAuthor"].as_bool().unwrap(), c["isAdmin"].as_bool().unwrap()))
        .collect();
    assert!(flags.contains(&(true, false)));
    assert!(flags.contains(&(false, true)));

    let (status, _) = app
        .call(Method::DELETE, &format!("{comments_uri}/{}", comment_ids[1]), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call(Method::DELETE, &format!("{comments_uri}/{}", comment_ids[1]), Some(&carol), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, "/api/v1/posts/xyz/comments", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn uploads_are_stored_and_served() {
    let app = test_app().await;
    let (_, token) = app.register("alice").await;

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/upload")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(&b"\x89PNG fake image"[..]))
        .unwrap();
    let (status, bytes) = app.raw(req).await;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["type"], "image");
    assert_eq!(body["status"], "temporary");
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/") && url.ends_with(".png"));

    let (status, served) = app
        .raw(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served, b"\x89PNG fake image");

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/upload")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/zip")
        .body(Body::from("zip"))
        .unwrap();
    let (status, _) = app.raw(req).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn drafts_publish_into_review() {
    let app = test_app().await;
    let (_, admin) = app.register("alice").await;
    let (_, bob) = app.register("bob").await;

    let (status, draft) = app
        .call(
            Method::POST,
            "/api/v1/drafts",
            Some(&bob),
            Some(json!({ "title": "", "content": "", "type": "image" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(draft["status"], "draft");
    let id = draft["id"].as_i64().unwrap();

    // Publishing needs a title and content.
    let publish = format!("/api/v1/drafts/{id}/publish");
    let (status, _) = app.call(Method::POST, &publish, Some(&bob), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, published) = app
        .call(Method::POST, &publish, Some(&bob), Some(json!({ "title": "done", "content": "text" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "pending");

    let (_, pending) = app.call(Method::GET, "/api/v1/admin/posts/pending", Some(&admin), None).await;
    assert_eq!(pending["total"], 1);
    assert_eq!(pending["list"][0]["id"], id);
}

#[tokio::test]
async fn malformed_query_strings_get_json_errors() {
    let app = test_app().await;
    let (_, admin) = app.register("alice").await;
    let post = app.approved_post(&admin, &admin, "hello").await;

    // Empty paging values count as absent.
    let uri = format!("/api/v1/posts/{post}/comments?page=&pageSize=");
    let (status, page) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["page"], 1);
    assert_eq!(page["pageSize"], 10);

    let (status, listing) = app.call(Method::GET, "/api/v1/posts?page=&limit=", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 1);

    let (status, body) = app.call(Method::GET, "/api/v1/posts?limit=x", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("limit"));

    let (status, body) = app
        .call(Method::GET, "/api/v1/users/1/followers?page=one", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn password_change_requires_the_old_password() {
    let app = test_app().await;
    let (_, token) = app.register("alice").await;
    let uri = "/api/v1/auth/change-password";

    let (status, _) = app
        .call(Method::POST, uri, None, Some(json!({ "oldPassword": "correct horse", "newPassword": "battery staple" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(Method::POST, uri, Some(&token), Some(json!({ "oldPassword": "nope nope", "newPassword": "battery staple" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("old password"));

    let (status, _) = app
        .call(Method::POST, uri, Some(&token), Some(json!({ "oldPassword": "correct horse", "newPassword": "short" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(Method::POST, uri, Some(&token), Some(json!({ "oldPassword": "correct horse", "newPassword": "battery staple" })))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let login = |password: &'static str| json!({ "username": "alice", "password": password });
    let (status, _) = app.call(Method::POST, "/api/v1/auth/login", None, Some(login("correct horse"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call(Method::POST, "/api/v1/auth/login", None, Some(login("battery staple"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn liked_posts_are_listed_per_user() {
    let app = test_app().await;
    let (_, admin) = app.register("alice").await;
    let (bob_id, bob) = app.register("bob").await;
    let first = app.approved_post(&admin, &admin, "first").await;
    let second = app.approved_post(&admin, &admin, "second").await;

    for post in [first, second] {
        let (status, _) = app
            .call(Method::POST, &format!("/api/v1/posts/{post}/like"), Some(&bob), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, liked) = app
        .call(Method::GET, &format!("/api/v1/users/{bob_id}/likes?limit=1"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(liked["total"], 2);
    assert_eq!(liked["list"].as_array().unwrap().len(), 1);

    let (status, _) = app.call(Method::GET, "/api/v1/users/999/likes", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn files_are_deleted_by_their_owner_within_the_rate_limit() {
    let app = test_app().await;
    let (_, alice) = app.register("alice").await;
    let (_, bob) = app.register("bob").await;

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/upload")
        .header(header::AUTHORIZATION, format!("Bearer {alice}"))
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(&b"png"[..]))
        .unwrap();
    let (status, bytes) = app.raw(req).await;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let url = body["url"].as_str().unwrap().to_string();

    let uri = "/api/v1/file/delete";
    let (status, _) = app.call(Method::POST, uri, Some(&bob), Some(json!({ "filePath": url }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::POST, uri, Some(&alice), Some(json!({ "filePath": url }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .raw(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // One delete spent; the rest of the minute's budget goes on misses.
    for _ in 1..FILE_DELETES_PER_MINUTE {
        let (status, _) = app.call(Method::POST, uri, Some(&alice), Some(json!({ "filePath": url }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    let (status, body) = app.call(Method::POST, uri, Some(&alice), Some(json!({ "filePath": url }))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].is_string());
}
