mod helpers;
mod rating;

pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use rating::{Rating, RatingConversionError, MAX_RATING, MIN_RATING};
pub use secret::Secret;
