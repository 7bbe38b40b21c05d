use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Sub},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Ratings are stored as hundredths of a point, so 4.75 stars is `Rating(475)`.
pub const MIN_RATING: Rating = Rating(0);
pub const MAX_RATING: Rating = Rating(500);

//--------------------------------------      Rating       -----------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Rating(i64);

op!(binary Rating, Add, add);
op!(binary Rating, Sub, sub);
op!(inplace Rating, AddAssign, add_assign);

impl Sum for Rating {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a rating: {0}")]
pub struct RatingConversionError(String);

impl From<i64> for Rating {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<f64> for Rating {
    type Error = RatingConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !(0.0..=5.0).contains(&value) {
            return Err(RatingConversionError(format!("{value} is outside of the 0..=5 star range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self((value * 100.0).round() as i64))
    }
}

impl PartialEq for Rating {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Rating {}

impl Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stars = self.0 as f64 / 100.0;
        write!(f, "{stars:0.2}")
    }
}

impl Rating {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// The average of a set of ratings, or `None` for an empty set.
    pub fn mean<I: IntoIterator<Item = Rating>>(ratings: I) -> Option<Rating> {
        let (count, total) = ratings.into_iter().fold((0i64, Rating::default()), |(n, sum), r| (n + 1, sum + r));
        if count == 0 {
            None
        } else {
            Some(Rating(total.0 / count))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn conversions() {
        let r = Rating::try_from(4.75).unwrap();
        assert_eq!(r.value(), 475);
        assert_eq!(r.to_string(), "4.75");
        assert!(Rating::try_from(5.5).is_err());
        assert!(Rating::try_from(-0.1).is_err());
    }

    #[test]
    fn ordering_and_mean() {
        let low = Rating::from(310);
        let high = Rating::from(480);
        assert!(high > low);
        let mean = Rating::mean([low, high]).unwrap();
        assert_eq!(mean.value(), 395);
        assert!(Rating::mean(Vec::new()).is_none());
        assert!(MAX_RATING > MIN_RATING);
    }
}
