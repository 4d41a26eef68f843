//! Ordering of rounds within an event.
//!
//! Reorders are expressed as pairwise swaps: [`move_round`] reads the
//! current ordering and emits a [`ReorderBatch`] of two edits tagged with
//! an [`OrderingToken`] of what it read. [`apply_reorder`] commits the
//! batch to a copy of the event only if the token still matches and the
//! result is again a permutation of `1..=N`.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, RoundError};
use crate::model::{Event, EventId, Round, RoundId};

/// Direction of a single-step move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards round 1.
    Up,
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("unknown direction '{other}' (expected up or down)")),
        }
    }
}

/// A single renumbering instruction inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOrderEdit {
    pub round_id: RoundId,
    pub new_round_number: u32,
}

/// SHA-256 digest over an event's `(round_id, round_number)` pairs.
///
/// Two reads of the same ordering produce the same token; any renumbering,
/// insertion or deletion changes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderingToken(String);

impl OrderingToken {
    pub fn of(event: &Event) -> Self {
        let mut pairs: Vec<(&str, u32)> = event
            .rounds()
            .iter()
            .map(|r| (r.id.as_str(), r.round_number))
            .collect();
        pairs.sort();

        let mut hasher = Sha256::new();
        hasher.update(event.event_id.as_str().as_bytes());
        for (id, number) in pairs {
            hasher.update(b"\n");
            hasher.update(id.as_bytes());
            hasher.update(b":");
            hasher.update(number.to_be_bytes());
        }
        OrderingToken(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for OrderingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Edits that must commit together, plus the ordering they were computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderBatch {
    pub event_id: EventId,
    pub expected: OrderingToken,
    pub edits: Vec<RoundOrderEdit>,
}

/// Plan a one-step move of `round_id` as a swap with its neighbour.
///
/// Fails with `BoundaryReached` when the round is already first (`Up`) or
/// last (`Down`); nothing is produced in that case.
pub fn move_round(event: &Event, round_id: &RoundId, direction: Direction) -> Result<ReorderBatch> {
    let round = event
        .round(round_id)
        .ok_or_else(|| RoundError::RoundNotFound(round_id.to_string()))?;

    let total = event.len() as i64;
    let current_index = i64::from(round.round_number) - 1;
    let target_index = match direction {
        Direction::Up => current_index - 1,
        Direction::Down => current_index + 1,
    };

    if target_index < 0 || target_index >= total {
        return Err(RoundError::BoundaryReached {
            round_id: round_id.clone(),
            direction,
        });
    }

    // Resolve by number, not by position in the backing vector.
    let target_number = (target_index + 1) as u32;
    let target = event
        .round_by_number(target_number)
        .ok_or_else(|| RoundError::InvalidReorder {
            event_id: event.event_id.clone(),
            reason: format!("no round occupies position {target_number}"),
        })?;

    Ok(ReorderBatch {
        event_id: event.event_id.clone(),
        expected: OrderingToken::of(event),
        edits: vec![
            RoundOrderEdit {
                round_id: round.id.clone(),
                new_round_number: target.round_number,
            },
            RoundOrderEdit {
                round_id: target.id.clone(),
                new_round_number: round.round_number,
            },
        ],
    })
}

/// Apply `batch` to a copy of `event`, all edits or none.
pub fn apply_reorder(event: &Event, batch: &ReorderBatch) -> Result<Event> {
    let invalid = |reason: String| RoundError::InvalidReorder {
        event_id: event.event_id.clone(),
        reason,
    };

    if batch.event_id != event.event_id {
        return Err(invalid(format!(
            "batch targets event {}",
            batch.event_id
        )));
    }
    if OrderingToken::of(event) != batch.expected {
        return Err(RoundError::ConcurrentModification {
            event_id: event.event_id.clone(),
        });
    }
    if batch.edits.is_empty() {
        return Err(invalid("batch contains no edits".to_string()));
    }

    let mut seen_ids = HashSet::new();
    let mut seen_numbers = HashSet::new();
    for edit in &batch.edits {
        if !seen_ids.insert(&edit.round_id) {
            return Err(invalid(format!("round {} edited twice", edit.round_id)));
        }
        if !seen_numbers.insert(edit.new_round_number) {
            return Err(invalid(format!(
                "duplicate target round number {}",
                edit.new_round_number
            )));
        }
    }

    let mut next = event.clone();
    let now = Utc::now();
    for edit in &batch.edits {
        let round = next
            .round_mut(&edit.round_id)
            .ok_or_else(|| invalid(format!("round {} not in event", edit.round_id)))?;
        round.round_number = edit.new_round_number;
        round.updated_at = Some(now);
    }
    next.sort_rounds();
    check_contiguous(&next)?;
    Ok(next)
}

/// Verify that round numbers are exactly `1..=N`, each once.
pub fn check_contiguous(event: &Event) -> Result<()> {
    let mut numbers: Vec<u32> = event.rounds().iter().map(|r| r.round_number).collect();
    numbers.sort_unstable();
    for (index, number) in numbers.iter().enumerate() {
        let expected = index as u32 + 1;
        if *number != expected {
            return Err(RoundError::InvalidReorder {
                event_id: event.event_id.clone(),
                reason: format!(
                    "round numbers {:?} are not a permutation of 1..={}",
                    numbers,
                    numbers.len()
                ),
            });
        }
    }
    Ok(())
}

/// Append `round` at the next free position.
pub(crate) fn append(event: &mut Event, mut round: Round) -> &Round {
    round.round_number = event.next_round_number();
    event.rounds.push(round);
    let last = event.rounds.len() - 1;
    &event.rounds[last]
}

/// Remove the round at `round_number` and close the gap behind it.
pub(crate) fn remove_and_compact(event: &mut Event, round_number: u32) -> Option<Round> {
    let index = event
        .rounds
        .iter()
        .position(|r| r.round_number == round_number)?;
    let removed = event.rounds.remove(index);
    let now = Utc::now();
    for round in event.rounds.iter_mut() {
        if round.round_number > round_number {
            round.round_number -= 1;
            round.updated_at = Some(now);
        }
    }
    event.sort_rounds();
    Some(removed)
}
