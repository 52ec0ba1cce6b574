use serde::{Deserialize, Serialize};

use super::ValidationError;
use crate::infra::Rating;

pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 5;

/// A star rating known to be within `MIN_SCORE..=MAX_SCORE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score(u8);

impl Score {
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (MIN_SCORE..=MAX_SCORE).contains(&value) {
            Ok(Score(value as u8))
        } else {
            Err(ValidationError::ScoreOutOfRange(value))
        }
    }

    pub fn get(self) -> i64 {
        i64::from(self.0)
    }
}

impl TryFrom<i64> for Score {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

/// Upserts `user`'s rating and returns the new list with its mean.
///
/// An existing entry for `user` is replaced in place, otherwise one is
/// appended.
pub fn aggregate(ratings: &[Rating], user: &str, score: Score) -> (Vec<Rating>, f64) {
    let mut updated = ratings.to_vec();
    match updated.iter_mut().find(|r| r.user_id == user) {
        Some(existing) => existing.rating = score.get(),
        None => updated.push(Rating {
            user_id: user.to_string(),
            rating: score.get(),
        }),
    }
    let mean = average(&updated);
    (updated, mean)
}

/// Mean rating rounded half-up to one decimal, 0 for no ratings.
pub fn average(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    // i128 so that corrupt stored values cannot overflow
    let count = ratings.len() as i128;
    let sum: i128 = ratings.iter().map(|r| i128::from(r.rating)).sum();
    // floor(10 * sum / count + 1/2) in integers
    let tenths = (20 * sum + count).div_euclid(2 * count);
    tenths as f64 / 10.0
}

pub fn rating_of(ratings: &[Rating], user: &str) -> Option<i64> {
    ratings.iter().find(|r| r.user_id == user).map(|r| r.rating)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: usize,
    /// The asking user's own rating.
    pub rating: Option<i64>,
}

impl RatingSummary {
    pub fn of(ratings: &[Rating], user: &str) -> Self {
        RatingSummary {
            average: average(ratings),
            count: ratings.len(),
            rating: rating_of(ratings, user),
        }
    }
}
