/// Bluenote comment ranking
///
/// Comments carry a cached `score` that is recomputed only when the comment
/// is created or when its like count changes. Reads never recompute, so the
/// `score` sort order reflects the value at the last mutation.
pub mod score;

pub use score::{age_hours, comment_score};
