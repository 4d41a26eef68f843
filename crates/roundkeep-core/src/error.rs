//! Error taxonomy for round mutations and queries.
//!
//! Every variant is recoverable at the caller boundary. Data-integrity
//! findings on score records are not errors; see
//! [`IntegrityWarning`](crate::aggregator::IntegrityWarning).

use thiserror::Error;

use crate::access::Operation;
use crate::lifecycle::RoundState;
use crate::model::{EventId, RoundId};
use crate::sequencer::Direction;

/// Errors produced by the round engine.
#[derive(Debug, Error)]
pub enum RoundError {
    /// The actor's role may not invoke the operation.
    #[error("insufficient role: '{role}' may not {operation}")]
    InsufficientRole { role: String, operation: Operation },

    /// Lifecycle operation attempted from a state that forbids it.
    #[error("invalid transition: cannot {operation} round {round_id} while {state}")]
    InvalidTransition {
        round_id: RoundId,
        state: RoundState,
        operation: Operation,
    },

    /// Move attempted past the first or last position.
    #[error("round {round_id} cannot move further {direction}")]
    BoundaryReached {
        round_id: RoundId,
        direction: Direction,
    },

    /// The ordering a reorder batch was computed against no longer holds.
    #[error("event {event_id} was modified concurrently; re-fetch and retry")]
    ConcurrentModification { event_id: EventId },

    #[error("event not found: {0}")]
    EventNotFound(EventId),

    #[error("round not found: {0}")]
    RoundNotFound(String),

    /// A reorder batch that would break the 1..N ordering.
    #[error("invalid reorder for event {event_id}: {reason}")]
    InvalidReorder { event_id: EventId, reason: String },

    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("invalid shortlist: {0}")]
    InvalidShortlist(String),

    /// Submitted points that are not a finite number.
    #[error("invalid score: {0}")]
    InvalidScore(String),

    /// A round weight outside the accepted percentage range.
    #[error("invalid weight: {0}")]
    InvalidWeight(String),

    /// A round record violating the data-model invariants.
    #[error("invalid round record {round_id}: {reason}")]
    InvalidRound { round_id: RoundId, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RoundError {
    /// Stable snake_case name of the error kind, for logs and machine output.
    pub fn kind(&self) -> &'static str {
        match self {
            RoundError::InsufficientRole { .. } => "insufficient_role",
            RoundError::InvalidTransition { .. } => "invalid_transition",
            RoundError::BoundaryReached { .. } => "boundary_reached",
            RoundError::ConcurrentModification { .. } => "concurrent_modification",
            RoundError::EventNotFound(_) => "event_not_found",
            RoundError::RoundNotFound(_) => "round_not_found",
            RoundError::InvalidReorder { .. } => "invalid_reorder",
            RoundError::InvalidCriteria(_) => "invalid_criteria",
            RoundError::InvalidShortlist(_) => "invalid_shortlist",
            RoundError::InvalidScore(_) => "invalid_score",
            RoundError::InvalidWeight(_) => "invalid_weight",
            RoundError::InvalidRound { .. } => "invalid_round",
            RoundError::InvalidConfig(_) => "invalid_config",
            RoundError::Storage(_) => "storage",
            RoundError::Serialization(_) => "serialization",
        }
    }

    /// Whether re-fetching state and retrying the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RoundError::ConcurrentModification { .. })
    }
}

/// Result type for round engine operations.
pub type Result<T> = std::result::Result<T, RoundError>;
