//! Event record: the exclusive owner of its rounds.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoundError};
use crate::model::ids::{EventId, RoundId};
use crate::model::round::Round;

/// A multi-round competition.
///
/// Rounds are kept sorted by `round_number`, and their numbers always form
/// `1..=N` between mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub event_code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub(crate) rounds: Vec<Round>,
}

impl Event {
    /// Create an event with no rounds.
    pub fn new(
        event_id: impl Into<EventId>,
        event_code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_code: event_code.into(),
            name: name.into(),
            description: None,
            rounds: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach pre-existing rounds, validating ownership and numbering.
    pub fn with_rounds(mut self, rounds: Vec<Round>) -> Result<Self> {
        self.rounds = rounds;
        self.sort_rounds();
        self.validate()?;
        Ok(self)
    }

    /// Rounds in `round_number` order.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn round(&self, round_id: &RoundId) -> Option<&Round> {
        self.rounds.iter().find(|r| &r.id == round_id)
    }

    pub fn round_by_number(&self, round_number: u32) -> Option<&Round> {
        self.rounds.iter().find(|r| r.round_number == round_number)
    }

    /// The number a newly appended round receives.
    pub fn next_round_number(&self) -> u32 {
        self.rounds.len() as u32 + 1
    }

    pub(crate) fn round_mut(&mut self, round_id: &RoundId) -> Option<&mut Round> {
        self.rounds.iter_mut().find(|r| &r.id == round_id)
    }

    pub(crate) fn sort_rounds(&mut self) {
        self.rounds.sort_by_key(|r| r.round_number);
    }

    /// Verify every round belongs here, satisfies its own invariants, and
    /// that the numbering is contiguous.
    pub fn validate(&self) -> Result<()> {
        for round in &self.rounds {
            if round.event_id != self.event_id {
                return Err(RoundError::InvalidRound {
                    round_id: round.id.clone(),
                    reason: format!(
                        "belongs to event {} but was attached to {}",
                        round.event_id, self.event_id
                    ),
                });
            }
            round.check_invariants()?;
        }
        crate::sequencer::check_contiguous(self)
    }
}
