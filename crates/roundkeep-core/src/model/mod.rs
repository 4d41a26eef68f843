//! Domain records for events, rounds and team scores.
//!
//! - `Event`: owns the ordered rounds of one competition
//! - `Round`: a scored stage with lifecycle flags and a criteria rubric
//! - `TeamScore`: one team's result for one round

pub mod event;
pub mod ids;
pub mod round;
pub mod score;

pub use event::Event;
pub use ids::{EventId, RoundId, ScoreId, TeamId};
pub use round::{
    validate_criteria, validate_weight, Criterion, OptionalField, Round, RoundCreateFields,
    RoundEditableFields, RoundMode, RoundStats, RoundStatus, RoundType,
    DEFAULT_WEIGHT_PERCENTAGE,
};
pub use score::{ScoreSubmission, TeamScore};
