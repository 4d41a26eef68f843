//! Round lifecycle state machine.
//!
//! `Active → Frozen → Evaluated`, with `Evaluated` terminal. Transitions
//! return a new [`Round`]; a rejected transition leaves the input untouched
//! and reports [`RoundError::InvalidTransition`].

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::access::Operation;
use crate::error::{Result, RoundError};
use crate::model::Round;

/// Lifecycle state derived from a round's `is_frozen` / `is_evaluated` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundState {
    Active,
    Frozen,
    Evaluated,
}

impl RoundState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundState::Evaluated)
    }
}

impl std::fmt::Display for RoundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RoundState::Active => "Active",
            RoundState::Frozen => "Frozen",
            RoundState::Evaluated => "Evaluated",
        };
        write!(f, "{}", s)
    }
}

/// Whether the round's descriptive fields and criteria may change.
pub fn can_edit(round: &Round) -> bool {
    !round.is_frozen
}

/// Whether the round may be deleted (cascading its scores).
pub fn can_delete(round: &Round) -> bool {
    !round.is_frozen
}

/// Lock the round. Fails on an already frozen round.
pub fn freeze(round: &Round) -> Result<Round> {
    if round.is_frozen {
        return Err(reject(round, Operation::FreezeRound));
    }
    let mut next = round.clone();
    next.is_frozen = true;
    next.updated_at = Some(Utc::now());
    Ok(next)
}

/// Finalize a frozen round. Fails unless the round is Frozen.
pub fn evaluate(round: &Round) -> Result<Round> {
    if !round.is_frozen || round.is_evaluated {
        return Err(reject(round, Operation::EvaluateRound));
    }
    let mut next = round.clone();
    next.is_evaluated = true;
    next.updated_at = Some(Utc::now());
    Ok(next)
}

/// Display state. `Evaluated` wins over `Frozen`.
pub fn status_label(round: &Round) -> RoundState {
    if round.is_evaluated {
        RoundState::Evaluated
    } else if round.is_frozen {
        RoundState::Frozen
    } else {
        RoundState::Active
    }
}

/// Fail with `InvalidTransition` unless the round is still editable.
pub fn ensure_editable(round: &Round, operation: Operation) -> Result<()> {
    if can_edit(round) {
        Ok(())
    } else {
        Err(reject(round, operation))
    }
}

fn reject(round: &Round, operation: Operation) -> RoundError {
    RoundError::InvalidTransition {
        round_id: round.id.clone(),
        state: status_label(round),
        operation,
    }
}
