use std::collections::HashMap;

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};
use tracing::debug;

use bluenote_types::api::UpdatePostRequest;
use bluenote_types::models::{PostStatus, PostType};

use crate::media::mark_media_used;
use crate::models::{NewPost, PostRow};
use crate::pagination::{PostCursorPage, PostCursorRequest, PostFilter, offset};
use crate::{
    Database, DbError, OptionalExt, Result, enum_col, json_list_col, timestamp, ts_col,
};

const POST_SELECT: &str = "SELECT p.id, p.user_id, u.username, u.nickname, u.avatar,
        p.title, p.content, p.type, p.files, p.cover_image, p.status, p.reject_reason,
        p.likes, p.comments, p.created_at, p.updated_at
     FROM posts p
     JOIN users u ON u.id = p.user_id";

impl NewPost {
    /// Image posts without an explicit cover use their first file.
    pub fn effective_cover(&self) -> String {
        if self.cover_image.is_empty() && self.post_type == PostType::Image {
            if let Some(first) = self.files.first() {
                return first.clone();
            }
        }
        self.cover_image.clone()
    }
}

impl Database {
    // -- Posts --

    pub fn create_post(&self, user_id: i64, post: &NewPost) -> Result<PostRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let id = insert_post(&tx, user_id, post)?;
            tx.commit()?;
            debug!("Created post {} ({}) for user {}", id, post.status, user_id);
            require_post(conn, id)
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Owner-only partial update. The post goes back to review (`pending`)
    /// unless `is_draft` keeps it a draft.
    pub fn update_post(&self, id: i64, user_id: i64, req: &UpdatePostRequest) -> Result<PostRow> {
        self.with_conn_mut(|conn| {
            let existing = require_post(conn, id)?;
            if existing.user_id != user_id {
                return Err(DbError::Forbidden("not allowed to modify this post".into()));
            }
            let status = if req.is_draft { PostStatus::Draft } else { PostStatus::Pending };

            let tx = conn.unchecked_transaction()?;
            apply_update(&tx, id, req, status)?;
            tx.commit()?;
            require_post(conn, id)
        })
    }

    pub fn delete_post(&self, id: i64, user_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let existing = require_post(conn, id)?;
            if existing.user_id != user_id {
                return Err(DbError::Forbidden("not allowed to delete this post".into()));
            }
            conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Offset listing, newest first. `default_status` applies when the
    /// filter names no status.
    pub fn list_posts(
        &self,
        filter: &PostFilter,
        default_status: Option<PostStatus>,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<PostRow>, i64)> {
        self.with_conn(|conn| {
            let sql = filter.to_sql(default_status);
            let where_clause = sql.where_clause();

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM posts p {where_clause}"),
                params_from_iter(sql.params.iter()),
                |r| r.get(0),
            )?;

            let mut params = sql.params.clone();
            params.push(Value::Integer(limit));
            params.push(Value::Integer(offset(page, limit)));
            let query = format!(
                "{POST_SELECT} {where_clause} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?"
            );
            let posts = query_posts(conn, &query, params)?;
            Ok((posts, total))
        })
    }

    /// Cursor pagination over posts by descending id.
    ///
    /// Only `approved` posts are returned unless the filter names a status.
    /// The cursor is an exclusive upper bound on the id, so posts created
    /// after a client obtained its cursor never show up on later pages and
    /// nothing already seen is repeated.
    pub fn posts_by_cursor(&self, req: &PostCursorRequest) -> Result<PostCursorPage> {
        self.with_conn(|conn| {
            let mut sql = req.filter.to_sql(Some(PostStatus::Approved));
            if let Some(cursor) = req.cursor {
                sql.push("p.id < ?", Value::Integer(cursor));
            }

            let mut params = sql.params.clone();
            // One extra row tells whether another page exists.
            params.push(Value::Integer(req.limit.saturating_add(1)));
            let query = format!("{POST_SELECT} {} ORDER BY p.id DESC LIMIT ?", sql.where_clause());
            let mut posts = query_posts(conn, &query, params)?;

            let limit = usize::try_from(req.limit).unwrap_or(usize::MAX);
            let has_more = posts.len() > limit;
            let mut next_cursor = String::new();
            if has_more {
                posts.truncate(limit);
                if let Some(last) = posts.last() {
                    next_cursor = last.id.to_string();
                }
            }

            Ok(PostCursorPage { posts, next_cursor, has_more })
        })
    }

    /// Moderation verdict. Only `approved` and `rejected` are valid outcomes.
    pub fn review_post(&self, id: i64, status: PostStatus, reason: Option<&str>) -> Result<PostRow> {
        if !matches!(status, PostStatus::Approved | PostStatus::Rejected) {
            return Err(DbError::InvalidArgument(format!(
                "review status must be approved or rejected, got '{status}'"
            )));
        }
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET status = ?2, reject_reason = ?3, updated_at = ?4 WHERE id = ?1",
                params![id, status.as_str(), reason, timestamp(Utc::now())],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound("post"));
            }
            require_post(conn, id)
        })
    }

    // -- Post likes --

    /// Returns the post's like count after the change.
    pub fn like_post(&self, post_id: i64, user_id: i64) -> Result<i64> {
        self.with_conn_mut(|conn| {
            require_post(conn, post_id)?;
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![post_id, user_id, timestamp(Utc::now())],
            )
            .map_err(|e| match DbError::from(e) {
                DbError::Conflict(_) => DbError::Conflict("post already liked".into()),
                other => other,
            })?;
            tx.execute("UPDATE posts SET likes = likes + 1 WHERE id = ?1", [post_id])?;
            let likes = post_likes(&tx, post_id)?;
            tx.commit()?;
            Ok(likes)
        })
    }

    pub fn unlike_post(&self, post_id: i64, user_id: i64) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let removed = tx.execute(
                "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
            )?;
            if removed == 0 {
                return Err(DbError::NotFound("post like"));
            }
            tx.execute(
                "UPDATE posts SET likes = likes - 1 WHERE id = ?1 AND likes > 0",
                [post_id],
            )?;
            let likes = post_likes(&tx, post_id)?;
            tx.commit()?;
            Ok(likes)
        })
    }

    /// Whether `user_id` likes the post, plus the post's like count.
    pub fn post_like_status(&self, post_id: i64, user_id: i64) -> Result<(bool, i64)> {
        self.with_conn(|conn| {
            require_post(conn, post_id)?;
            let liked: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                    params![post_id, user_id],
                    |r| r.get(0),
                )
                .optional()?;
            Ok((liked.is_some(), post_likes(conn, post_id)?))
        })
    }

    /// Approved posts `user_id` has liked, most recently liked first.
    pub fn liked_posts(&self, user_id: i64, page: i64, limit: i64) -> Result<(Vec<PostRow>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM post_likes l
                 JOIN posts p ON p.id = l.post_id
                 WHERE l.user_id = ?1 AND p.status = 'approved'",
                [user_id],
                |r| r.get(0),
            )?;
            let query = format!(
                "{POST_SELECT} JOIN post_likes l ON l.post_id = p.id
                 WHERE l.user_id = ? AND p.status = 'approved'
                 ORDER BY l.created_at DESC, p.id DESC LIMIT ? OFFSET ?"
            );
            let params = vec![
                Value::Integer(user_id),
                Value::Integer(limit),
                Value::Integer(offset(page, limit)),
            ];
            Ok((query_posts(conn, &query, params)?, total))
        })
    }

    // -- Drafts --

    /// Create a draft, or overwrite `draft_id` when it is one of the user's drafts.
    pub fn save_draft(&self, user_id: i64, draft_id: Option<i64>, post: &NewPost) -> Result<PostRow> {
        let draft = NewPost { status: PostStatus::Draft, ..post.clone() };
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let id = match draft_id {
                Some(id) => {
                    require_draft(&tx, id, user_id)?;
                    tx.execute(
                        "UPDATE posts SET title = ?2, content = ?3, type = ?4, files = ?5,
                            cover_image = ?6, updated_at = ?7
                         WHERE id = ?1",
                        params![
                            id,
                            draft.title,
                            draft.content,
                            draft.post_type.as_str(),
                            serde_json::to_string(&draft.files)?,
                            draft.effective_cover(),
                            timestamp(Utc::now()),
                        ],
                    )?;
                    replace_tags(&tx, id, &draft.tags)?;
                    id
                }
                None => insert_post(&tx, user_id, &draft)?,
            };
            tx.commit()?;
            require_post(conn, id)
        })
    }

    /// The user's drafts, most recently edited first.
    pub fn list_drafts(&self, user_id: i64, page: i64, limit: i64) -> Result<(Vec<PostRow>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE user_id = ?1 AND status = 'draft'",
                [user_id],
                |r| r.get(0),
            )?;
            let query = format!(
                "{POST_SELECT} WHERE p.user_id = ? AND p.status = 'draft'
                 ORDER BY p.updated_at DESC, p.id DESC LIMIT ? OFFSET ?"
            );
            let params = vec![
                Value::Integer(user_id),
                Value::Integer(limit),
                Value::Integer(offset(page, limit)),
            ];
            Ok((query_posts(conn, &query, params)?, total))
        })
    }

    pub fn get_draft(&self, id: i64, user_id: i64) -> Result<PostRow> {
        self.with_conn(|conn| require_draft(conn, id, user_id))
    }

    pub fn delete_draft(&self, id: i64, user_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM posts WHERE id = ?1 AND user_id = ?2 AND status = 'draft'",
                params![id, user_id],
            )?;
            if removed == 0 {
                return Err(DbError::NotFound("draft"));
            }
            Ok(())
        })
    }

    /// Submit a draft for review, applying any non-empty overrides first.
    pub fn publish_draft(&self, id: i64, user_id: i64, overrides: &UpdatePostRequest) -> Result<PostRow> {
        self.with_conn_mut(|conn| {
            let draft = require_draft(conn, id, user_id)?;
            let tx = conn.unchecked_transaction()?;
            apply_update(&tx, id, overrides, PostStatus::Pending)?;
            if overrides.files.is_none() {
                mark_media_used(&tx, &draft.files)?;
            }
            tx.commit()?;
            require_post(conn, id)
        })
    }
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        nickname: row.get(3)?,
        avatar: row.get(4)?,
        title: row.get(5)?,
        content: row.get(6)?,
        post_type: enum_col(row, 7)?,
        tags: Vec::new(),
        files: json_list_col(row, 8)?,
        cover_image: row.get(9)?,
        status: enum_col(row, 10)?,
        reject_reason: row.get(11)?,
        likes: row.get(12)?,
        comments: row.get(13)?,
        created_at: ts_col(row, 14)?,
        updated_at: ts_col(row, 15)?,
    })
}

fn query_posts(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<Vec<PostRow>> {
    let mut stmt = conn.prepare(sql)?;
    let mut posts = stmt
        .query_map(params_from_iter(params), map_post)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    attach_tags(conn, &mut posts)?;
    Ok(posts)
}

pub(crate) fn query_post(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    let mut posts = query_posts(
        conn,
        &format!("{POST_SELECT} WHERE p.id = ?"),
        vec![Value::Integer(id)],
    )?;
    Ok(posts.pop())
}

pub(crate) fn require_post(conn: &Connection, id: i64) -> Result<PostRow> {
    query_post(conn, id)?.ok_or(DbError::NotFound("post"))
}

fn require_draft(conn: &Connection, id: i64, user_id: i64) -> Result<PostRow> {
    match query_post(conn, id)? {
        Some(post) if post.user_id == user_id && post.status == PostStatus::Draft => Ok(post),
        _ => Err(DbError::NotFound("draft")),
    }
}

fn post_likes(conn: &Connection, post_id: i64) -> Result<i64> {
    Ok(conn.query_row("SELECT likes FROM posts WHERE id = ?1", [post_id], |r| r.get(0))?)
}

/// Batch-fetch tags for a page of posts in one query.
fn attach_tags(conn: &Connection, posts: &mut [PostRow]) -> Result<()> {
    if posts.is_empty() {
        return Ok(());
    }

    let placeholders: Vec<String> = (1..=posts.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT post_id, tag FROM post_tags WHERE post_id IN ({}) ORDER BY rowid",
        placeholders.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(posts.iter().map(|p| p.id)), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_post: HashMap<i64, Vec<String>> = HashMap::new();
    for (post_id, tag) in rows {
        by_post.entry(post_id).or_default().push(tag);
    }
    for post in posts.iter_mut() {
        post.tags = by_post.remove(&post.id).unwrap_or_default();
    }
    Ok(())
}

fn insert_post(conn: &Connection, user_id: i64, post: &NewPost) -> Result<i64> {
    let now = timestamp(Utc::now());
    conn.execute(
        "INSERT INTO posts (user_id, title, content, type, files, cover_image, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            user_id,
            post.title,
            post.content,
            post.post_type.as_str(),
            serde_json::to_string(&post.files)?,
            post.effective_cover(),
            post.status.as_str(),
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    replace_tags(conn, id, &post.tags)?;
    if post.status != PostStatus::Draft {
        mark_media_used(conn, &post.files)?;
    }
    Ok(id)
}

fn replace_tags(conn: &Connection, post_id: i64, tags: &[String]) -> Result<()> {
    conn.execute("DELETE FROM post_tags WHERE post_id = ?1", [post_id])?;
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO post_tags (post_id, tag) VALUES (?1, ?2)")?;
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        stmt.execute(params![post_id, tag])?;
    }
    Ok(())
}

/// Overwrite the non-empty fields of `req` and set `status`.
fn apply_update(conn: &Connection, id: i64, req: &UpdatePostRequest, status: PostStatus) -> Result<()> {
    let non_empty = |s: &Option<String>| s.as_deref().filter(|v| !v.trim().is_empty()).map(str::to_string);
    let files = req.files.as_ref().map(serde_json::to_string).transpose()?;

    conn.execute(
        "UPDATE posts SET
            title = COALESCE(?2, title),
            content = COALESCE(?3, content),
            files = COALESCE(?4, files),
            cover_image = COALESCE(?5, cover_image),
            status = ?6,
            reject_reason = NULL,
            updated_at = ?7
         WHERE id = ?1",
        params![
            id,
            non_empty(&req.title),
            non_empty(&req.content),
            files,
            non_empty(&req.cover_image),
            status.as_str(),
            timestamp(Utc::now()),
        ],
    )?;
    if let Some(tags) = &req.tags {
        replace_tags(conn, id, tags)?;
    }
    if let Some(files) = &req.files {
        if status != PostStatus::Draft {
            mark_media_used(conn, files)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn cursor_req(cursor: Option<&str>, limit: i64) -> PostCursorRequest {
        PostCursorRequest::parse(cursor, Some(limit), PostFilter::default()).unwrap()
    }

    fn ids(page: &PostCursorPage) -> Vec<i64> {
        page.posts.iter().map(|p| p.id).collect()
    }

    #[test]
    fn cursor_walks_descending_ids() {
        let db = testutil::db();
        let u = testutil::user(&db, "alice");
        for _ in 0..5 {
            testutil::post(&db, u, PostStatus::Approved);
        }

        let first = db.posts_by_cursor(&cursor_req(None, 2)).unwrap();
        assert_eq!(ids(&first), vec![5, 4]);
        assert!(first.has_more);
        assert_eq!(first.next_cursor, "4");

        let second = db.posts_by_cursor(&cursor_req(Some("4"), 2)).unwrap();
        assert_eq!(ids(&second), vec![3, 2]);
        assert!(second.has_more);
        assert_eq!(second.next_cursor, "2");

        let third = db.posts_by_cursor(&cursor_req(Some("2"), 2)).unwrap();
        assert_eq!(ids(&third), vec![1]);
        assert!(!third.has_more);
        assert_eq!(third.next_cursor, "");
    }

    #[test]
    fn cursor_ignores_posts_inserted_later() {
        let db = testutil::db();
        let u = testutil::user(&db, "alice");
        for _ in 0..5 {
            testutil::post(&db, u, PostStatus::Approved);
        }
        let first = db.posts_by_cursor(&cursor_req(None, 2)).unwrap();

        // New posts land above the cursor.
        testutil::post(&db, u, PostStatus::Approved);
        testutil::post(&db, u, PostStatus::Approved);

        let mut seen = ids(&first);
        let mut cursor = first.next_cursor.clone();
        while !cursor.is_empty() {
            let page = db.posts_by_cursor(&cursor_req(Some(&cursor), 2)).unwrap();
            seen.extend(ids(&page));
            cursor = page.next_cursor;
        }
        assert_eq!(seen, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn cursor_defaults_to_approved_posts() {
        let db = testutil::db();
        let u = testutil::user(&db, "alice");
        let approved = testutil::post(&db, u, PostStatus::Approved);
        let pending = testutil::post(&db, u, PostStatus::Pending);
        testutil::post(&db, u, PostStatus::Draft);

        let page = db.posts_by_cursor(&cursor_req(None, 10)).unwrap();
        assert_eq!(ids(&page), vec![approved]);

        let filter = PostFilter::parse(None, None, Some("pending"), None).unwrap();
        let req = PostCursorRequest::parse(None, Some(10), filter).unwrap();
        assert_eq!(ids(&db.posts_by_cursor(&req).unwrap()), vec![pending]);
    }

    #[test]
    fn cursor_filters_combine() {
        let db = testutil::db();
        let a = testutil::user(&db, "alice");
        let b = testutil::user(&db, "bob");
        let travel = testutil::post(&db, a, PostStatus::Approved);
        testutil::post(&db, b, PostStatus::Approved);
        let video = db
            .create_post(
                a,
                &NewPost {
                    title: "clip".into(),
                    content: "c".into(),
                    post_type: PostType::Video,
                    tags: vec!["food".into()],
                    files: vec!["/uploads/v.mp4".into()],
                    cover_image: String::new(),
                    status: PostStatus::Approved,
                },
            )
            .unwrap();

        let owner = a.to_string();
        let by_tag = PostFilter::parse(None, Some("travel"), None, Some(owner.as_str())).unwrap();
        let req = PostCursorRequest::parse(None, Some(10), by_tag).unwrap();
        assert_eq!(ids(&db.posts_by_cursor(&req).unwrap()), vec![travel]);

        let by_type = PostFilter::parse(Some("video"), None, None, None).unwrap();
        let req = PostCursorRequest::parse(None, Some(10), by_type).unwrap();
        let page = db.posts_by_cursor(&req).unwrap();
        assert_eq!(ids(&page), vec![video.id]);
        assert_eq!(page.posts[0].tags, vec!["food".to_string()]);
        // Video covers are never derived from the files.
        assert_eq!(page.posts[0].cover_image, "");
    }

    #[test]
    fn huge_limit_does_not_overflow() {
        let db = testutil::db();
        let u = testutil::user(&db, "alice");
        testutil::post(&db, u, PostStatus::Approved);
        let page = db.posts_by_cursor(&cursor_req(None, i64::MAX)).unwrap();
        assert_eq!(page.posts.len(), 1);
        assert!(!page.has_more);
    }

    #[test]
    fn only_owner_updates_or_deletes() {
        let db = testutil::db();
        let a = testutil::user(&db, "alice");
        let b = testutil::user(&db, "bob");
        let id = testutil::post(&db, a, PostStatus::Approved);

        let req = UpdatePostRequest { title: Some("new".into()), ..Default::default() };
        assert!(matches!(db.update_post(id, b, &req), Err(DbError::Forbidden(_))));
        assert!(matches!(db.delete_post(id, b), Err(DbError::Forbidden(_))));

        let updated = db.update_post(id, a, &req).unwrap();
        assert_eq!(updated.title, "new");
        assert_eq!(updated.content, "content");
        assert_eq!(updated.status, PostStatus::Pending);

        db.delete_post(id, a).unwrap();
        assert!(db.get_post(id).unwrap().is_none());
    }

    #[test]
    fn post_likes_are_unique_per_user() {
        let db = testutil::db();
        let a = testutil::user(&db, "alice");
        let b = testutil::user(&db, "bob");
        let id = testutil::post(&db, a, PostStatus::Approved);

        assert_eq!(db.like_post(id, b).unwrap(), 1);
        assert!(matches!(db.like_post(id, b), Err(DbError::Conflict(_))));
        assert_eq!(db.post_like_status(id, b).unwrap(), (true, 1));
        assert_eq!(db.unlike_post(id, b).unwrap(), 0);
        assert!(matches!(db.unlike_post(id, b), Err(DbError::NotFound(_))));
        assert!(matches!(db.like_post(999, b), Err(DbError::NotFound(_))));
    }

    #[test]
    fn liked_posts_skip_unapproved() {
        let db = testutil::db();
        let a = testutil::user(&db, "alice");
        let b = testutil::user(&db, "bob");
        let first = testutil::post(&db, a, PostStatus::Approved);
        let second = testutil::post(&db, a, PostStatus::Approved);
        let hidden = testutil::post(&db, a, PostStatus::Pending);
        db.like_post(first, b).unwrap();
        db.like_post(hidden, b).unwrap();
        db.like_post(second, b).unwrap();

        let (posts, total) = db.liked_posts(b, 1, 10).unwrap();
        assert_eq!(total, 2);
        let liked: Vec<i64> = posts.iter().map(|p| p.id).collect();
        assert!(liked.contains(&first) && liked.contains(&second));
        assert!(!liked.contains(&hidden));

        let (page, total) = db.liked_posts(b, 2, 1).unwrap();
        assert_eq!((page.len(), total), (1, 2));
        assert_eq!(db.liked_posts(a, 1, 10).unwrap().1, 0);
    }

    #[test]
    fn drafts_round_trip_through_publish() {
        let db = testutil::db();
        let a = testutil::user(&db, "alice");
        let b = testutil::user(&db, "bob");
        let draft = NewPost {
            title: "wip".into(),
            content: "body".into(),
            post_type: PostType::Image,
            tags: vec!["x".into()],
            files: vec!["/uploads/1.png".into(), "/uploads/2.png".into()],
            cover_image: String::new(),
            status: PostStatus::Pending,
        };
        let saved = db.save_draft(a, None, &draft).unwrap();
        assert_eq!(saved.status, PostStatus::Draft);
        assert_eq!(saved.cover_image, "/uploads/1.png");

        let edited = NewPost { title: "wip 2".into(), ..draft.clone() };
        let saved = db.save_draft(a, Some(saved.id), &edited).unwrap();
        assert_eq!(saved.title, "wip 2");
        assert!(matches!(db.save_draft(b, Some(saved.id), &edited), Err(DbError::NotFound(_))));

        let (drafts, total) = db.list_drafts(a, 1, 10).unwrap();
        assert_eq!(total, 1);
        assert_eq!(drafts[0].id, saved.id);
        assert!(matches!(db.get_draft(saved.id, b), Err(DbError::NotFound(_))));

        let published = db.publish_draft(saved.id, a, &UpdatePostRequest::default()).unwrap();
        assert_eq!(published.status, PostStatus::Pending);
        assert!(matches!(db.delete_draft(saved.id, a), Err(DbError::NotFound(_))));
    }

    #[test]
    fn review_and_offset_listing() {
        let db = testutil::db();
        let a = testutil::user(&db, "alice");
        let p1 = testutil::post(&db, a, PostStatus::Pending);
        let p2 = testutil::post(&db, a, PostStatus::Pending);

        assert!(matches!(
            db.review_post(p1, PostStatus::Draft, None),
            Err(DbError::InvalidArgument(_))
        ));
        let rejected = db.review_post(p1, PostStatus::Rejected, Some("blurry")).unwrap();
        assert_eq!(rejected.reject_reason.as_deref(), Some("blurry"));
        db.review_post(p2, PostStatus::Approved, None).unwrap();

        let (posts, total) = db
            .list_posts(&PostFilter::default(), Some(PostStatus::Approved), 1, 10)
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(posts[0].id, p2);
        assert_eq!(posts[0].tags, vec!["travel".to_string()]);

        let (_, total) = db.list_posts(&PostFilter::default(), None, 1, 10).unwrap();
        assert_eq!(total, 2);
    }
}
