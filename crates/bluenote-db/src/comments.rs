use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use tracing::debug;

use bluenote_ranking::{age_hours, comment_score};
use bluenote_types::models::Role;

use crate::models::CommentRow;
use crate::pagination::{CommentPage, CommentPageRequest};
use crate::posts::require_post;
use crate::users::query_user_by_id;
use crate::{Database, DbError, OptionalExt, Result, timestamp, ts_col};

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.user_id, u.username, u.nickname, u.avatar,
        c.content, c.created_at, c.updated_at, c.scored_at, c.likes, c.score,
        c.is_author, c.is_admin
     FROM comments c
     JOIN users u ON u.id = c.user_id";

impl Database {
    /// Insert a comment scored at age zero. The author and admin flags are
    /// captured now and never re-evaluated.
    pub fn create_comment(
        &self,
        post_id: i64,
        user_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<CommentRow> {
        self.with_conn_mut(|conn| {
            let post = require_post(conn, post_id)?;
            let user = query_user_by_id(conn, user_id)?.ok_or(DbError::NotFound("user"))?;
            let is_author = post.user_id == user_id;
            let is_admin = user.role == Role::Admin;
            let score = comment_score(0.0, 0, is_author, is_admin);
            let now = timestamp(now);

            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO comments
                    (post_id, user_id, content, created_at, updated_at, scored_at, likes, score, is_author, is_admin)
                 VALUES (?1, ?2, ?3, ?4, ?4, ?4, 0, ?5, ?6, ?7)",
                params![post_id, user_id, content, now, score, is_author, is_admin],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute("UPDATE posts SET comments = comments + 1 WHERE id = ?1", [post_id])?;
            tx.commit()?;

            debug!("Comment {} on post {} scored {:.4}", id, post_id, score);
            require_comment(conn, id)
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    /// Author-only delete. The comment must belong to `post_id`.
    pub fn delete_comment(&self, post_id: i64, comment_id: i64, user_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let comment = match query_comment(conn, comment_id)? {
                Some(c) if c.post_id == post_id => c,
                _ => return Err(DbError::NotFound("comment")),
            };
            if comment.user_id != user_id {
                return Err(DbError::Forbidden("not allowed to delete this comment".into()));
            }

            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?;
            tx.execute(
                "UPDATE posts SET comments = comments - 1 WHERE id = ?1 AND comments > 0",
                [post_id],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Like a comment and persist its recomputed score.
    pub fn like_comment(&self, comment_id: i64, user_id: i64, now: DateTime<Utc>) -> Result<CommentRow> {
        self.with_conn_mut(|conn| {
            if query_comment(conn, comment_id)?.is_none() {
                return Err(DbError::NotFound("comment"));
            }
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO comment_likes (comment_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![comment_id, user_id, timestamp(now)],
            )
            .map_err(|e| match DbError::from(e) {
                DbError::Conflict(_) => DbError::Conflict("comment already liked".into()),
                other => other,
            })?;
            tx.execute("UPDATE comments SET likes = likes + 1 WHERE id = ?1", [comment_id])?;
            rescore(&tx, comment_id, now)?;
            tx.commit()?;
            require_comment(conn, comment_id)
        })
    }

    pub fn unlike_comment(&self, comment_id: i64, user_id: i64, now: DateTime<Utc>) -> Result<CommentRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let removed = tx.execute(
                "DELETE FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
                params![comment_id, user_id],
            )?;
            if removed == 0 {
                return Err(DbError::NotFound("comment like"));
            }
            tx.execute(
                "UPDATE comments SET likes = likes - 1 WHERE id = ?1 AND likes > 0",
                [comment_id],
            )?;
            rescore(&tx, comment_id, now)?;
            tx.commit()?;
            require_comment(conn, comment_id)
        })
    }

    /// One page of a post's comments. A post with no comments (or no such
    /// post) yields an empty page with a total of zero.
    pub fn comments_page(&self, post_id: i64, req: &CommentPageRequest) -> Result<CommentPage> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
                [post_id],
                |r| r.get(0),
            )?;

            let sql = format!(
                "{COMMENT_SELECT} WHERE c.post_id = ?1 ORDER BY {} LIMIT ?2 OFFSET ?3",
                req.order_by()
            );
            let mut stmt = conn.prepare(&sql)?;
            let comments = stmt
                .query_map(params![post_id, req.page_size, req.offset()], map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(CommentPage { comments, total, request: *req })
        })
    }
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        nickname: row.get(4)?,
        avatar: row.get(5)?,
        content: row.get(6)?,
        created_at: ts_col(row, 7)?,
        updated_at: ts_col(row, 8)?,
        scored_at: ts_col(row, 9)?,
        likes: row.get(10)?,
        score: row.get(11)?,
        is_author: row.get(12)?,
        is_admin: row.get(13)?,
    })
}

fn query_comment(conn: &Connection, id: i64) -> Result<Option<CommentRow>> {
    conn.query_row(&format!("{COMMENT_SELECT} WHERE c.id = ?1"), [id], map_comment)
        .optional()
}

fn require_comment(conn: &Connection, id: i64) -> Result<CommentRow> {
    query_comment(conn, id)?.ok_or(DbError::NotFound("comment"))
}

/// Re-read the like counter and persist a fresh score. Must run inside the
/// transaction that changed the counter.
fn rescore(conn: &Connection, comment_id: i64, now: DateTime<Utc>) -> Result<f64> {
    let comment = require_comment(conn, comment_id)?;
    let likes = u64::try_from(comment.likes).unwrap_or(0);
    let score = comment_score(
        age_hours(comment.created_at, now),
        likes,
        comment.is_author,
        comment.is_admin,
    );
    let now = timestamp(now);
    conn.execute(
        "UPDATE comments SET score = ?2, scored_at = ?3, updated_at = ?3 WHERE id = ?1",
        params![comment_id, score, now],
    )?;
    debug!("Rescored comment {} ({} likes): {:.4}", comment_id, likes, score);
    Ok(score)
}
