use crate::{Database, Result};

const TOP_TAGS: i64 = 10;

/// Site-wide counters for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteStats {
    pub total_users: i64,
    pub total_posts: i64,
    pub pending_posts: i64,
    pub total_comments: i64,
    /// Most used tags with their post counts, busiest first.
    pub tags: Vec<(String, i64)>,
}

impl Database {
    pub fn site_stats(&self) -> Result<SiteStats> {
        self.with_conn(|conn| {
            let mut stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM posts),
                    (SELECT COUNT(*) FROM posts WHERE status = 'pending'),
                    (SELECT COUNT(*) FROM comments)",
                [],
                |r| {
                    Ok(SiteStats {
                        total_users: r.get(0)?,
                        total_posts: r.get(1)?,
                        pending_posts: r.get(2)?,
                        total_comments: r.get(3)?,
                        tags: Vec::new(),
                    })
                },
            )?;

            let mut stmt = conn.prepare(
                "SELECT tag, COUNT(*) AS n FROM post_tags
                 GROUP BY tag ORDER BY n DESC, tag ASC LIMIT ?1",
            )?;
            stats.tags = stmt
                .query_map([TOP_TAGS], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(stats)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::models::NewPost;
    use crate::testutil;
    use bluenote_types::models::{PostStatus, PostType};
    use chrono::Utc;

    #[test]
    fn stats_count_everything() {
        let db = testutil::db();
        let a = testutil::user(&db, "alice");
        let b = testutil::user(&db, "bob");
        let p = testutil::post(&db, a, PostStatus::Approved);
        testutil::post(&db, b, PostStatus::Pending);
        db.create_post(
            b,
            &NewPost {
                title: "t".into(),
                content: "c".into(),
                post_type: PostType::Image,
                tags: vec!["food".into(), "travel".into()],
                files: vec![],
                cover_image: String::new(),
                status: PostStatus::Pending,
            },
        )
        .unwrap();
        db.create_comment(p, b, "nice", Utc::now()).unwrap();

        let stats = db.site_stats().unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_posts, 3);
        assert_eq!(stats.pending_posts, 2);
        assert_eq!(stats.total_comments, 1);
        assert_eq!(
            stats.tags,
            vec![("travel".to_string(), 3), ("food".to_string(), 1)]
        );
    }
}
