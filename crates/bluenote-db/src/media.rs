use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use bluenote_types::models::{MediaStatus, PostType};

use crate::models::MediaRow;
use crate::{Database, OptionalExt, Result, enum_col, timestamp, ts_col};

const MEDIA_COLUMNS: &str = "id, user_id, file_name, kind, size, status, created_at";

impl Database {
    /// Record an uploaded file as `temporary` until a post references it.
    pub fn insert_media(
        &self,
        id: &str,
        user_id: i64,
        file_name: &str,
        kind: PostType,
        size: i64,
    ) -> Result<MediaRow> {
        let now = Utc::now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO media (id, user_id, file_name, kind, size, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'temporary', ?6)",
                params![id, user_id, file_name, kind.as_str(), size, timestamp(now)],
            )?;
            Ok(())
        })?;
        Ok(MediaRow {
            id: id.to_string(),
            user_id,
            file_name: file_name.to_string(),
            kind,
            size,
            status: MediaStatus::Temporary,
            created_at: now,
        })
    }

    pub fn media_by_file_name(&self, file_name: &str) -> Result<Option<MediaRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {MEDIA_COLUMNS} FROM media WHERE file_name = ?1"),
                [file_name],
                map_media,
            )
            .optional()
        })
    }

    /// Temporary uploads created before `cutoff`, oldest first.
    pub fn expired_media(&self, cutoff: DateTime<Utc>) -> Result<Vec<MediaRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEDIA_COLUMNS} FROM media
                 WHERE status = 'temporary' AND created_at < ?1
                 ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map([timestamp(cutoff)], map_media)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_media(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM media WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }
}

fn map_media(row: &Row<'_>) -> rusqlite::Result<MediaRow> {
    Ok(MediaRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        file_name: row.get(2)?,
        kind: enum_col(row, 3)?,
        size: row.get(4)?,
        status: enum_col(row, 5)?,
        created_at: ts_col(row, 6)?,
    })
}

/// Mark the uploads referenced by a post's file URLs as used. URLs are
/// matched on their last path segment; unknown names are ignored.
pub(crate) fn mark_media_used(conn: &Connection, files: &[String]) -> Result<()> {
    if files.is_empty() {
        return Ok(());
    }
    let now = timestamp(Utc::now());
    let mut stmt = conn.prepare(
        "UPDATE media SET status = 'used', used_at = ?2
         WHERE file_name = ?1 AND status = 'temporary'",
    )?;
    for file in files {
        let name = file.rsplit('/').next().unwrap_or(file);
        if !name.is_empty() {
            stmt.execute(params![name, now])?;
        }
    }
    Ok(())
}
