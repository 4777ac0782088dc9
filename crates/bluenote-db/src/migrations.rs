use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // AUTOINCREMENT: identifiers strictly increase and are never reused,
        // which the post cursor relies on.
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                nickname    TEXT NOT NULL,
                avatar      TEXT NOT NULL DEFAULT '',
                bio         TEXT NOT NULL DEFAULT '',
                role        TEXT NOT NULL DEFAULT 'user',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE posts (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id       INTEGER NOT NULL REFERENCES users(id),
                title         TEXT NOT NULL,
                content       TEXT NOT NULL,
                type          TEXT NOT NULL,
                files         TEXT NOT NULL DEFAULT '[]',
                cover_image   TEXT NOT NULL DEFAULT '',
                status        TEXT NOT NULL,
                reject_reason TEXT,
                likes         INTEGER NOT NULL DEFAULT 0,
                comments      INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE INDEX idx_posts_status ON posts(status, id);
            CREATE INDEX idx_posts_user ON posts(user_id, status);

            CREATE TABLE post_tags (
                post_id  INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                tag      TEXT NOT NULL,
                PRIMARY KEY (post_id, tag)
            );

            CREATE INDEX idx_post_tags_tag ON post_tags(tag);

            CREATE TABLE post_likes (
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (post_id, user_id)
            );

            CREATE TABLE comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                scored_at   TEXT NOT NULL,
                likes       INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
                score       REAL NOT NULL DEFAULT 0,
                is_author   INTEGER NOT NULL DEFAULT 0,
                is_admin    INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_comments_post ON comments(post_id);

            CREATE TABLE comment_likes (
                comment_id  INTEGER NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (comment_id, user_id)
            );

            CREATE TABLE follows (
                follower_id   INTEGER NOT NULL REFERENCES users(id),
                following_id  INTEGER NOT NULL REFERENCES users(id),
                created_at    TEXT NOT NULL,
                PRIMARY KEY (follower_id, following_id)
            );

            CREATE INDEX idx_follows_following ON follows(following_id);

            CREATE TABLE media (
                id          TEXT PRIMARY KEY,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                file_name   TEXT NOT NULL UNIQUE,
                kind        TEXT NOT NULL,
                size        INTEGER NOT NULL,
                status      TEXT NOT NULL DEFAULT 'temporary',
                created_at  TEXT NOT NULL,
                used_at     TEXT
            );

            CREATE INDEX idx_media_status ON media(status, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
