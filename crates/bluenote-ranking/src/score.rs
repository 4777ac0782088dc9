use chrono::{DateTime, Utc};

/// Upper bound of any comment score.
pub const MAX_SCORE: f64 = 10.0;

const LIKE_WEIGHT: f64 = 0.4;
const AUTHOR_WEIGHT: f64 = 0.3;
const ADMIN_FACTOR: f64 = 0.5;
const TIME_WEIGHT: f64 = 0.3;

/// Reference window (hours) for the logarithmic time decay.
const DECAY_WINDOW_HOURS: f64 = 24.0;
/// Exponential decay constant (hours) for the author/admin bonus.
const BONUS_DECAY_HOURS: f64 = 48.0;
/// Sigmoid scale (hours) gating the time bonus.
const SIGMOID_SCALE_HOURS: f64 = 12.0;

/// Compute the ranking score of a comment.
///
/// `hours` must be non-negative; use [`age_hours`] to derive it from a
/// creation timestamp. The result lies in `[0, MAX_SCORE]`.
pub fn comment_score(hours: f64, likes: u64, is_author: bool, is_admin: bool) -> f64 {
    let time_decay = 1.0 / (1.0 + (hours / DECAY_WINDOW_HOURS).ln_1p());

    let like_score = (likes as f64).ln_1p() * LIKE_WEIGHT;

    let bonus_decay = (-hours / BONUS_DECAY_HOURS).exp();
    let mut author_score = 0.0;
    if is_author {
        author_score += AUTHOR_WEIGHT * bonus_decay;
    }
    if is_admin {
        author_score += AUTHOR_WEIGHT * ADMIN_FACTOR * bonus_decay;
    }

    let gate = 1.0 / (1.0 + (-hours / SIGMOID_SCALE_HOURS).exp());
    let time_score = time_decay * TIME_WEIGHT * gate;

    let total = like_score + author_score + time_score;
    total.min(MAX_SCORE)
}

/// Hours elapsed between `created_at` and `now`. Clock skew that would make
/// the age negative is clamped to zero.
pub fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - created_at).num_milliseconds().max(0);
    millis as f64 / 3_600_000.0
}
