use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A string that did not name any variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

string_enum!(Role, "role", { User => "user", Admin => "admin" });

/// Moderation lifecycle of a post.
/// `draft` is private to its author; `pending` waits for review;
/// only `approved` posts are listed publicly by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

string_enum!(PostStatus, "status", {
    Draft => "draft",
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Image,
    Video,
}

string_enum!(PostType, "type", { Image => "image", Video => "video" });

/// Sort key for a post's comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    Time,
    Likes,
    Score,
}

string_enum!(CommentSort, "sort key", {
    Time => "time",
    Likes => "likes",
    Score => "score",
});

impl CommentSort {
    /// Lenient parse for query parameters: anything unrecognized ranks by score.
    pub fn from_param(param: Option<&str>) -> Self {
        param.and_then(|p| p.parse().ok()).unwrap_or(Self::Score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

string_enum!(SortOrder, "order", { Asc => "asc", Desc => "desc" });

impl SortOrder {
    /// Only an explicit `asc` sorts ascending.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Temporary,
    Used,
}

string_enum!(MediaStatus, "media status", { Temporary => "temporary", Used => "used" });

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sort_falls_back_to_score() {
        assert_eq!(CommentSort::from_param(None), CommentSort::Score);
        assert_eq!(CommentSort::from_param(Some("popularity")), CommentSort::Score);
        assert_eq!(CommentSort::from_param(Some("likes")), CommentSort::Likes);
        assert_eq!(CommentSort::from_param(Some("time")), CommentSort::Time);
    }

    #[test]
    fn only_asc_sorts_ascending() {
        assert_eq!(SortOrder::from_param(Some("asc")), SortOrder::Asc);
        assert_eq!(SortOrder::from_param(Some("ASC")), SortOrder::Desc);
        assert_eq!(SortOrder::from_param(Some("sideways")), SortOrder::Desc);
        assert_eq!(SortOrder::from_param(None), SortOrder::Desc);
    }

    #[test]
    fn status_parse_rejects_unknown() {
        assert_eq!("approved".parse::<PostStatus>(), Ok(PostStatus::Approved));
        let err = "published".parse::<PostStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid status: 'published'");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&PostType::Video).unwrap();
        assert_eq!(json, "\"video\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
