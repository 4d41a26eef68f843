//! Roundkeep Core Library
//!
//! Round lifecycle, ordering and score aggregation for multi-round events.
//! Pure rules live in [`lifecycle`], [`sequencer`], [`aggregator`] and
//! [`shortlist`]; [`service::RoundService`] composes them with access checks
//! and a [`store::RoundStore`].

pub mod access;
pub mod aggregator;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod model;
pub mod obs;
pub mod sequencer;
pub mod service;
pub mod shortlist;
pub mod store;
pub mod telemetry;

pub use access::{authorize, require, AccessDecision, DenyReason, Operation, Role};
pub use aggregator::{
    event_leaderboard, integrity_warnings, leaderboard, normalize, presentation_label, rank_of,
    round_stats, EventLeaderboardRow, IntegrityWarning, LabelKind, LeaderboardRow,
    NormalizedScore, PresentationLabel,
};
pub use config::EngineConfig;
pub use error::{Result, RoundError};
pub use lifecycle::RoundState;
pub use model::{
    Criterion, Event, EventId, OptionalField, Round, RoundCreateFields, RoundEditableFields,
    RoundId, RoundMode, RoundStats, RoundStatus, RoundType, ScoreId, ScoreSubmission, TeamId,
    TeamScore, DEFAULT_WEIGHT_PERCENTAGE,
};
pub use sequencer::{Direction, OrderingToken, ReorderBatch, RoundOrderEdit};
pub use service::{RoundService, ScoreReceipt, ScoreView};
pub use shortlist::{ShortlistOutcome, ShortlistRule};
pub use store::{EventSnapshot, MemoryRoundStore, RoundStore};

/// Crate version, surfaced by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
