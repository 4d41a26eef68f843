//! In-memory [`RoundStore`].
//!
//! Each event lives behind its own `tokio::sync::Mutex`, which is the
//! per-event exclusive section: every write to an event (including the
//! delete cascade and reorder commit) runs entirely inside it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::error::{Result, RoundError};
use crate::model::{
    validate_criteria, Criterion, Event, EventId, Round, RoundCreateFields, RoundEditableFields,
    RoundId, TeamScore,
};
use crate::sequencer::{self, ReorderBatch};
use crate::store::{EventSnapshot, RoundStore};

#[derive(Debug)]
struct EventState {
    event: Event,
    scores: HashMap<RoundId, Vec<TeamScore>>,
}

/// In-memory store backed by `HashMap<EventId, Mutex<EventState>>`.
#[derive(Debug, Default)]
pub struct MemoryRoundStore {
    events: RwLock<HashMap<EventId, Arc<Mutex<EventState>>>>,
    round_index: RwLock<HashMap<RoundId, EventId>>,
}

impl MemoryRoundStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously exported snapshots.
    pub async fn from_snapshots(snapshots: Vec<EventSnapshot>) -> Result<Self> {
        let store = Self::new();
        for snapshot in snapshots {
            let event_id = snapshot.event.event_id.clone();
            store.create_event(snapshot.event).await?;
            let slot = store.slot(&event_id).await?;
            let mut state = slot.lock().await;
            for score in snapshot.scores {
                if state.event.round(&score.round_id).is_none() {
                    return Err(RoundError::RoundNotFound(score.round_id.to_string()));
                }
                Self::insert_score(&mut state, score);
            }
        }
        Ok(store)
    }

    /// Export every event with its scores, ordered by event id.
    pub async fn export(&self) -> Vec<EventSnapshot> {
        let slots: Vec<Arc<Mutex<EventState>>> = {
            let events = self.events.read().await;
            let mut ids: Vec<&EventId> = events.keys().collect();
            ids.sort();
            ids.into_iter().map(|id| Arc::clone(&events[id])).collect()
        };

        let mut snapshots = Vec::with_capacity(slots.len());
        for slot in slots {
            let state = slot.lock().await;
            let mut scores: Vec<TeamScore> = state
                .event
                .rounds()
                .iter()
                .flat_map(|r| state.scores.get(&r.id).cloned().unwrap_or_default())
                .collect();
            scores.sort_by(|a, b| (&a.round_id, &a.team_id).cmp(&(&b.round_id, &b.team_id)));
            snapshots.push(EventSnapshot {
                event: state.event.clone(),
                scores,
            });
        }
        snapshots
    }

    async fn slot(&self, event_id: &EventId) -> Result<Arc<Mutex<EventState>>> {
        let events = self.events.read().await;
        events
            .get(event_id)
            .cloned()
            .ok_or_else(|| RoundError::EventNotFound(event_id.clone()))
    }

    async fn slot_for_round(&self, round_id: &RoundId) -> Result<Arc<Mutex<EventState>>> {
        let event_id = {
            let index = self.round_index.read().await;
            index
                .get(round_id)
                .cloned()
                .ok_or_else(|| RoundError::RoundNotFound(round_id.to_string()))?
        };
        self.slot(&event_id).await
    }

    fn insert_score(state: &mut EventState, mut score: TeamScore) -> TeamScore {
        let entries = state.scores.entry(score.round_id.clone()).or_default();
        match entries.iter_mut().find(|s| s.team_id == score.team_id) {
            Some(existing) => {
                score.id = existing.id.clone();
                score.created_at = existing.created_at;
                score.updated_at = Some(Utc::now());
                *existing = score.clone();
            }
            None => entries.push(score.clone()),
        }
        score
    }
}

fn round_by_number<'a>(state: &'a EventState, round_number: u32) -> Result<&'a Round> {
    state.event.round_by_number(round_number).ok_or_else(|| {
        RoundError::RoundNotFound(format!("{}#{}", state.event.event_id, round_number))
    })
}

#[async_trait]
impl RoundStore for MemoryRoundStore {
    async fn create_event(&self, mut event: Event) -> Result<Event> {
        event.sort_rounds();
        event.validate()?;

        let mut events = self.events.write().await;
        if events.contains_key(&event.event_id) {
            return Err(RoundError::Storage(format!(
                "event {} already exists",
                event.event_id
            )));
        }
        let mut index = self.round_index.write().await;
        for round in event.rounds() {
            if index.contains_key(&round.id) {
                return Err(RoundError::Storage(format!(
                    "round id {} already in use",
                    round.id
                )));
            }
        }
        for round in event.rounds() {
            index.insert(round.id.clone(), event.event_id.clone());
        }
        events.insert(
            event.event_id.clone(),
            Arc::new(Mutex::new(EventState {
                event: event.clone(),
                scores: HashMap::new(),
            })),
        );
        Ok(event)
    }

    async fn get_event(&self, event_id: &EventId) -> Result<Event> {
        let slot = self.slot(event_id).await?;
        let state = slot.lock().await;
        Ok(state.event.clone())
    }

    async fn list_rounds_for_event(&self, event_id: &EventId) -> Result<Vec<Round>> {
        let slot = self.slot(event_id).await?;
        let state = slot.lock().await;
        Ok(state.event.rounds().to_vec())
    }

    async fn create_round(&self, event_id: &EventId, fields: RoundCreateFields) -> Result<Round> {
        validate_criteria(&fields.criteria)?;
        let slot = self.slot(event_id).await?;
        let mut state = slot.lock().await;

        let round_id = RoundId::new();
        let round = Round::new(round_id.clone(), event_id.clone(), 0, fields);
        let created = sequencer::append(&mut state.event, round).clone();

        self.round_index
            .write()
            .await
            .insert(round_id, event_id.clone());
        Ok(created)
    }

    async fn update_round(
        &self,
        event_id: &EventId,
        round_number: u32,
        fields: RoundEditableFields,
    ) -> Result<Round> {
        let slot = self.slot(event_id).await?;
        let mut state = slot.lock().await;
        let round_id = round_by_number(&state, round_number)?.id.clone();
        let round = state
            .event
            .round_mut(&round_id)
            .ok_or_else(|| RoundError::RoundNotFound(round_id.to_string()))?;
        round.apply_edits(fields);
        Ok(round.clone())
    }

    async fn delete_round(&self, event_id: &EventId, round_number: u32) -> Result<usize> {
        let slot = self.slot(event_id).await?;
        let mut state = slot.lock().await;
        let removed = sequencer::remove_and_compact(&mut state.event, round_number).ok_or_else(
            || RoundError::RoundNotFound(format!("{}#{}", event_id, round_number)),
        )?;
        let scores_removed = state
            .scores
            .remove(&removed.id)
            .map(|s| s.len())
            .unwrap_or(0);
        self.round_index.write().await.remove(&removed.id);
        Ok(scores_removed)
    }

    async fn update_round_criteria(
        &self,
        round_id: &RoundId,
        criteria: Vec<Criterion>,
    ) -> Result<Round> {
        validate_criteria(&criteria)?;
        let slot = self.slot_for_round(round_id).await?;
        let mut state = slot.lock().await;
        let round = state
            .event
            .round_mut(round_id)
            .ok_or_else(|| RoundError::RoundNotFound(round_id.to_string()))?;
        round.criteria = criteria;
        round.updated_at = Some(Utc::now());
        Ok(round.clone())
    }

    async fn reorder_rounds(&self, event_id: &EventId, batch: &ReorderBatch) -> Result<Event> {
        let slot = self.slot(event_id).await?;
        let mut state = slot.lock().await;
        let next = sequencer::apply_reorder(&state.event, batch)?;
        state.event = next.clone();
        Ok(next)
    }

    async fn get_round_details(&self, round_id: &RoundId) -> Result<Round> {
        let slot = self.slot_for_round(round_id).await?;
        let state = slot.lock().await;
        state
            .event
            .round(round_id)
            .cloned()
            .ok_or_else(|| RoundError::RoundNotFound(round_id.to_string()))
    }

    async fn put_round(&self, round: Round) -> Result<Round> {
        round.check_invariants()?;
        let slot = self.slot_for_round(&round.id).await?;
        let mut state = slot.lock().await;
        let existing = state
            .event
            .round_mut(&round.id)
            .ok_or_else(|| RoundError::RoundNotFound(round.id.to_string()))?;
        if existing.round_number != round.round_number || existing.event_id != round.event_id {
            return Err(RoundError::InvalidRound {
                round_id: round.id.clone(),
                reason: "position and event cannot change through put_round".to_string(),
            });
        }
        *existing = round.clone();
        Ok(round)
    }

    async fn scores_for_round(&self, round_id: &RoundId) -> Result<Vec<TeamScore>> {
        let slot = self.slot_for_round(round_id).await?;
        let state = slot.lock().await;
        Ok(state.scores.get(round_id).cloned().unwrap_or_default())
    }

    async fn upsert_score(&self, score: TeamScore) -> Result<TeamScore> {
        let slot = self.slot_for_round(&score.round_id).await?;
        let mut state = slot.lock().await;
        if state.event.event_id != score.event_id {
            return Err(RoundError::Storage(format!(
                "score for round {} names event {}",
                score.round_id, score.event_id
            )));
        }
        Ok(Self::insert_score(&mut state, score))
    }
}
