use chrono::Utc;
use rusqlite::{Connection, Row, params};
use tracing::info;

use bluenote_types::models::Role;

use crate::models::{UserRow, UserStats};
use crate::pagination::offset;
use crate::{Database, DbError, OptionalExt, Result, enum_col, timestamp, ts_col};

const USER_COLUMNS: &str =
    "id, username, password, nickname, avatar, bio, role, created_at, updated_at";

impl Database {
    // -- Accounts --

    /// Insert a new account. The very first account becomes the admin.
    pub fn create_user(&self, username: &str, password_hash: &str, nickname: &str) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let existing: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            let role = if existing == 0 { Role::Admin } else { Role::User };
            let now = timestamp(Utc::now());

            tx.execute(
                "INSERT INTO users (username, password, nickname, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![username, password_hash, nickname, role.as_str(), now],
            )
            .map_err(|e| match DbError::from(e) {
                DbError::Conflict(_) => DbError::Conflict(format!("username '{username}' is taken")),
                other => other,
            })?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            if role == Role::Admin {
                info!("Bootstrapped admin account '{}'", username);
            }
            query_user_by_id(conn, id)?.ok_or(DbError::NotFound("user"))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                [username],
                map_user,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn require_user(&self, id: i64) -> Result<UserRow> {
        self.get_user_by_id(id)?.ok_or(DbError::NotFound("user"))
    }

    /// Overwrite the profile fields that are `Some`.
    pub fn update_profile(
        &self,
        id: i64,
        nickname: Option<&str>,
        avatar: Option<&str>,
        bio: Option<&str>,
    ) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    nickname = COALESCE(?2, nickname),
                    avatar = COALESCE(?3, avatar),
                    bio = COALESCE(?4, bio),
                    updated_at = ?5
                 WHERE id = ?1",
                params![id, nickname, avatar, bio, timestamp(Utc::now())],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound("user"));
            }
            query_user_by_id(conn, id)?.ok_or(DbError::NotFound("user"))
        })
    }

    pub fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, password_hash, timestamp(Utc::now())],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound("user"));
            }
            Ok(())
        })
    }

    pub fn user_stats(&self, id: i64) -> Result<UserStats> {
        self.with_conn(|conn| query_user_stats(conn, id))
    }

    // -- Follows --

    /// Returns the follower's following count and the target's follower count.
    pub fn follow(&self, follower_id: i64, following_id: i64) -> Result<(i64, i64)> {
        if follower_id == following_id {
            return Err(DbError::InvalidArgument("cannot follow yourself".into()));
        }
        self.with_conn_mut(|conn| {
            if query_user_by_id(conn, following_id)?.is_none() {
                return Err(DbError::NotFound("user"));
            }
            conn.execute(
                "INSERT INTO follows (follower_id, following_id, created_at) VALUES (?1, ?2, ?3)",
                params![follower_id, following_id, timestamp(Utc::now())],
            )
            .map_err(|e| match DbError::from(e) {
                DbError::Conflict(_) => DbError::Conflict("already following this user".into()),
                other => other,
            })?;
            follow_counts(conn, follower_id, following_id)
        })
    }

    pub fn unfollow(&self, follower_id: i64, following_id: i64) -> Result<(i64, i64)> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                params![follower_id, following_id],
            )?;
            if removed == 0 {
                return Err(DbError::NotFound("follow"));
            }
            follow_counts(conn, follower_id, following_id)
        })
    }

    pub fn is_following(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        self.with_conn(|conn| query_is_following(conn, follower_id, following_id))
    }

    /// Accounts `user_id` follows, newest follow first. Each entry carries
    /// whether `viewer` follows that account.
    pub fn list_following(
        &self,
        user_id: i64,
        viewer: Option<i64>,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<(UserRow, bool)>, i64)> {
        self.with_conn(|conn| {
            list_follow_edges(conn, "f.follower_id", "f.following_id", user_id, viewer, page, limit)
        })
    }

    /// Accounts following `user_id`, newest first.
    pub fn list_followers(
        &self,
        user_id: i64,
        viewer: Option<i64>,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<(UserRow, bool)>, i64)> {
        self.with_conn(|conn| {
            list_follow_edges(conn, "f.following_id", "f.follower_id", user_id, viewer, page, limit)
        })
    }
}

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        nickname: row.get(3)?,
        avatar: row.get(4)?,
        bio: row.get(5)?,
        role: enum_col(row, 6)?,
        created_at: ts_col(row, 7)?,
        updated_at: ts_col(row, 8)?,
    })
}

pub(crate) fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id],
        map_user,
    )
    .optional()
}

fn query_user_stats(conn: &Connection, id: i64) -> Result<UserStats> {
    let stats = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE following_id = ?1),
            (SELECT COALESCE(SUM(likes), 0) FROM posts WHERE user_id = ?1),
            (SELECT COUNT(*) FROM posts WHERE user_id = ?1 AND status != 'draft')",
        [id],
        |r| {
            Ok(UserStats {
                follow_count: r.get(0)?,
                fans_count: r.get(1)?,
                like_count: r.get(2)?,
                post_count: r.get(3)?,
            })
        },
    )?;
    Ok(stats)
}

fn query_is_following(conn: &Connection, follower_id: i64, following_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2",
            params![follower_id, following_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn follow_counts(conn: &Connection, follower_id: i64, following_id: i64) -> Result<(i64, i64)> {
    let follow_count = query_user_stats(conn, follower_id)?.follow_count;
    let fans_count = query_user_stats(conn, following_id)?.fans_count;
    Ok((follow_count, fans_count))
}

/// `anchor` is the column matched against `user_id`; `other` is the user
/// returned on each edge.
fn list_follow_edges(
    conn: &Connection,
    anchor: &str,
    other: &str,
    user_id: i64,
    viewer: Option<i64>,
    page: i64,
    limit: i64,
) -> Result<(Vec<(UserRow, bool)>, i64)> {
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM follows f WHERE {anchor} = ?1"),
        [user_id],
        |r| r.get(0),
    )?;

    let sql = format!(
        "SELECT u.id, u.username, u.password, u.nickname, u.avatar, u.bio, u.role,
                u.created_at, u.updated_at
         FROM follows f
         JOIN users u ON u.id = {other}
         WHERE {anchor} = ?1
         ORDER BY f.created_at DESC, u.id DESC
         LIMIT ?2 OFFSET ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map(params![user_id, limit, offset(page, limit)], map_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut list = Vec::with_capacity(users.len());
    for user in users {
        let following = match viewer {
            Some(v) if v != user.id => query_is_following(conn, v, user.id)?,
            _ => false,
        };
        list.push((user, following));
    }
    Ok((list, total))
}
