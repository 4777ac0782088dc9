//! Request normalization for the comment pager (offset based) and the post
//! pager (cursor based), plus the shared filter builder for post listings.

use rusqlite::types::Value;

use bluenote_types::api::{CommentQuery, PostListQuery};
use bluenote_types::models::{CommentSort, PostStatus, PostType, SortOrder};

use crate::models::{CommentRow, PostRow};
use crate::{DbError, Result, parse_id};

/// Page size used when the caller does not send one.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Coerce a 1-based page number and a page size: absent values take the
/// defaults, values below 1 become 1. There is no upper clamp here.
pub fn page_bounds(page: Option<i64>, page_size: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    (page, page_size)
}

/// Rows to skip for a coerced `(page, page_size)`; saturates instead of
/// overflowing for absurd inputs.
pub fn offset(page: i64, page_size: i64) -> i64 {
    (page - 1).saturating_mul(page_size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentPageRequest {
    pub page: i64,
    pub page_size: i64,
    pub sort: CommentSort,
    pub order: SortOrder,
}

impl CommentPageRequest {
    pub fn new(
        page: Option<i64>,
        page_size: Option<i64>,
        sort_by: Option<&str>,
        order: Option<&str>,
    ) -> Self {
        let (page, page_size) = page_bounds(page, page_size);
        Self {
            page,
            page_size,
            sort: CommentSort::from_param(sort_by),
            order: SortOrder::from_param(order),
        }
    }

    pub fn from_query(query: &CommentQuery) -> Self {
        Self::new(
            query.page,
            query.page_size,
            query.sort_by.as_deref(),
            query.order.as_deref(),
        )
    }

    pub fn offset(&self) -> i64 {
        offset(self.page, self.page_size)
    }

    /// ORDER BY clause. Equal sort keys fall back to ascending id so that
    /// pages stay stable across requests.
    pub(crate) fn order_by(&self) -> String {
        let column = match self.sort {
            CommentSort::Time => "c.created_at",
            CommentSort::Likes => "c.likes",
            CommentSort::Score => "c.score",
        };
        format!("{} {}, c.id ASC", column, self.order.sql())
    }
}

impl Default for CommentPageRequest {
    fn default() -> Self {
        Self::new(None, None, None, None)
    }
}

/// One page of a post's comments. `total` counts every comment on the post.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentPage {
    pub comments: Vec<CommentRow>,
    pub total: i64,
    pub request: CommentPageRequest,
}

/// Exact-match post filters, ANDed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub post_type: Option<PostType>,
    pub tag: Option<String>,
    pub status: Option<PostStatus>,
    pub user_id: Option<i64>,
}

impl PostFilter {
    /// Validate raw filter strings. Empty strings count as absent.
    pub fn parse(
        post_type: Option<&str>,
        tag: Option<&str>,
        status: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Self> {
        let post_type = non_empty(post_type)
            .map(|t| t.parse::<PostType>())
            .transpose()
            .map_err(|e| DbError::InvalidArgument(e.to_string()))?;
        let status = non_empty(status)
            .map(|s| s.parse::<PostStatus>())
            .transpose()
            .map_err(|e| DbError::InvalidArgument(e.to_string()))?;
        let user_id = non_empty(user_id).map(|u| parse_id(u, "userId")).transpose()?;

        Ok(Self {
            post_type,
            tag: non_empty(tag).map(str::to_string),
            status,
            user_id,
        })
    }

    pub fn from_query(query: &PostListQuery) -> Result<Self> {
        Self::parse(
            query.post_type.as_deref(),
            query.tag.as_deref(),
            query.status.as_deref(),
            query.user_id.as_deref(),
        )
    }

    /// Build `WHERE` conditions for the `posts p` alias. `default_status`
    /// applies when no explicit status filter was given.
    pub(crate) fn to_sql(&self, default_status: Option<PostStatus>) -> SqlFilter {
        let mut sql = SqlFilter::default();
        if let Some(status) = self.status.or(default_status) {
            sql.push("p.status = ?", Value::Text(status.as_str().to_string()));
        }
        if let Some(post_type) = self.post_type {
            sql.push("p.type = ?", Value::Text(post_type.as_str().to_string()));
        }
        if let Some(tag) = &self.tag {
            sql.push(
                "EXISTS (SELECT 1 FROM post_tags t WHERE t.post_id = p.id AND t.tag = ?)",
                Value::Text(tag.clone()),
            );
        }
        if let Some(user_id) = self.user_id {
            sql.push("p.user_id = ?", Value::Integer(user_id));
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCursorRequest {
    /// Exclusive upper bound on post id; `None` starts from the newest post.
    pub cursor: Option<i64>,
    pub limit: i64,
    pub filter: PostFilter,
}

impl PostCursorRequest {
    pub fn parse(cursor: Option<&str>, limit: Option<i64>, filter: PostFilter) -> Result<Self> {
        let cursor = non_empty(cursor).map(|c| parse_id(c, "cursor")).transpose()?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        Ok(Self { cursor, limit, filter })
    }

    pub fn from_query(query: &PostListQuery) -> Result<Self> {
        Self::parse(query.cursor.as_deref(), query.limit, PostFilter::from_query(query)?)
    }
}

#[derive(Debug, Clone)]
pub struct PostCursorPage {
    pub posts: Vec<PostRow>,
    /// Id of the last post on the page when more remain, empty otherwise.
    pub next_cursor: String,
    pub has_more: bool,
}

/// Positional `?` conditions with their bound values.
#[derive(Debug, Default)]
pub(crate) struct SqlFilter {
    conditions: Vec<String>,
    pub params: Vec<Value>,
}

impl SqlFilter {
    pub fn push(&mut self, condition: &str, value: Value) {
        self.conditions.push(condition.to_string());
        self.params.push(value);
    }

    /// `WHERE a AND b`, or an empty string with no conditions.
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
