//! Persistence collaborator for events, rounds and scores.
//!
//! [`RoundStore`] is the seam between the engine and whatever holds the
//! records. Implementations must make each call atomic and must serialize
//! writes per event. [`memory::MemoryRoundStore`] is the in-process
//! implementation used by the CLI and by tests.
//!
//! The store does not enforce lifecycle rules; [`crate::service`] does
//! that before calling in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    Criterion, Event, EventId, Round, RoundCreateFields, RoundEditableFields, RoundId, TeamScore,
};
use crate::sequencer::ReorderBatch;

pub mod memory;

pub use memory::MemoryRoundStore;

/// An event together with all score records of its rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub event: Event,
    #[serde(default)]
    pub scores: Vec<TeamScore>,
}

#[async_trait]
pub trait RoundStore: Send + Sync {
    /// Register an event (with any rounds it already owns).
    async fn create_event(&self, event: Event) -> Result<Event>;

    async fn get_event(&self, event_id: &EventId) -> Result<Event>;

    /// Rounds of an event in `round_number` order.
    async fn list_rounds_for_event(&self, event_id: &EventId) -> Result<Vec<Round>>;

    /// Append a new Active round at `N + 1`; the store assigns its id.
    async fn create_round(&self, event_id: &EventId, fields: RoundCreateFields) -> Result<Round>;

    async fn update_round(
        &self,
        event_id: &EventId,
        round_number: u32,
        fields: RoundEditableFields,
    ) -> Result<Round>;

    /// Delete a round, cascade its scores, and close the numbering gap.
    /// Returns the number of score records removed.
    async fn delete_round(&self, event_id: &EventId, round_number: u32) -> Result<usize>;

    async fn update_round_criteria(&self, round_id: &RoundId, criteria: Vec<Criterion>)
        -> Result<Round>;

    /// Commit a reorder batch atomically. Fails with `ConcurrentModification`
    /// if the batch's ordering token no longer matches.
    async fn reorder_rounds(&self, event_id: &EventId, batch: &ReorderBatch) -> Result<Event>;

    async fn get_round_details(&self, round_id: &RoundId) -> Result<Round>;

    /// Replace a round's record in place (lifecycle flags, stats, shortlist).
    /// Its position must not change.
    async fn put_round(&self, round: Round) -> Result<Round>;

    async fn scores_for_round(&self, round_id: &RoundId) -> Result<Vec<TeamScore>>;

    /// Insert or replace the score of `(team_id, round_id)`.
    async fn upsert_score(&self, score: TeamScore) -> Result<TeamScore>;
}
