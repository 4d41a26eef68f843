//! Mutation facade over a [`RoundStore`].
//!
//! Every mutating entry point follows the same sequence:
//!
//! 1. `access::require` on the actor's role (no state touched on denial)
//! 2. enter the event's exclusive section
//! 3. read current state and validate it with `lifecycle` / `sequencer`
//! 4. write through the store
//!
//! Read-side helpers (leaderboards, stats, score views) need no role.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument};

use crate::access::{self, Operation, Role};
use crate::aggregator::{
    self, EventLeaderboardRow, IntegrityWarning, LeaderboardRow, PresentationLabel,
};
use crate::config::EngineConfig;
use crate::error::{Result, RoundError};
use crate::lifecycle;
use crate::metrics::METRICS;
use crate::model::{
    validate_criteria, validate_weight, Criterion, Event, EventId, Round, RoundCreateFields,
    RoundEditableFields, RoundId, RoundStats, ScoreSubmission, TeamScore,
};
use crate::obs;
use crate::sequencer::{self, Direction, ReorderBatch};
use crate::shortlist::{self, ShortlistOutcome, ShortlistRule};
use crate::store::RoundStore;

/// A stored score plus the integrity findings raised while recording it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReceipt {
    pub score: TeamScore,
    pub warnings: Vec<IntegrityWarning>,
}

/// Everything a score display needs for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreView {
    pub score: TeamScore,
    pub label: PresentationLabel,
    pub max_possible: f64,
    pub within_bounds: bool,
    pub warnings: Vec<IntegrityWarning>,
}

pub struct RoundService {
    store: Arc<dyn RoundStore>,
    config: EngineConfig,
    locks: Mutex<HashMap<EventId, Arc<Mutex<()>>>>,
}

impl RoundService {
    pub fn new(store: Arc<dyn RoundStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RoundStore> {
        &self.store
    }

    /// Enter the exclusive section for `event_id`.
    async fn lock_event(&self, event_id: &EventId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(event_id.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Resolve a round's event, enter its section, and re-read the round.
    async fn lock_round(&self, round_id: &RoundId) -> Result<(OwnedMutexGuard<()>, Round)> {
        let event_id = self.store.get_round_details(round_id).await?.event_id;
        let guard = self.lock_event(&event_id).await;
        let round = self.store.get_round_details(round_id).await?;
        Ok((guard, round))
    }

    // -----------------------------------------------------------------------
    // Events and round CRUD
    // -----------------------------------------------------------------------

    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "create_event", event_id = %event.event_id))]
    pub async fn create_event(&self, actor: &Role, event: Event) -> Result<Event> {
        access::require(actor, Operation::CreateEvent)?;
        let _section = self.lock_event(&event.event_id).await;
        let created = self.store.create_event(event).await?;
        obs::emit_event_created(created.event_id.as_str(), created.len());
        METRICS.inc_applied();
        Ok(created)
    }

    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "create_round", event_id = %event_id))]
    pub async fn create_round(
        &self,
        actor: &Role,
        event_id: &EventId,
        fields: RoundCreateFields,
    ) -> Result<Round> {
        access::require(actor, Operation::CreateRound)?;
        validate_criteria(&fields.criteria)?;
        let _section = self.lock_event(event_id).await;

        let round = self.store.create_round(event_id, fields).await?;
        obs::emit_round_created(event_id.as_str(), round.id.as_str(), round.round_number());
        METRICS.inc_applied();
        Ok(round)
    }

    /// Edit descriptive fields. Rejected on a frozen round before any
    /// submitted field is looked at.
    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "edit_round", event_id = %event_id, round_number = round_number))]
    pub async fn update_round(
        &self,
        actor: &Role,
        event_id: &EventId,
        round_number: u32,
        fields: RoundEditableFields,
    ) -> Result<Round> {
        access::require(actor, Operation::EditRound)?;
        let _section = self.lock_event(event_id).await;

        let current = self.round_at(event_id, round_number).await?;
        lifecycle::ensure_editable(&current, Operation::EditRound)?;

        let updated = self.store.update_round(event_id, round_number, fields).await?;
        obs::emit_round_updated(event_id.as_str(), updated.id.as_str());
        METRICS.inc_applied();
        Ok(updated)
    }

    /// Delete a non-frozen round and its scores. Later rounds move up by one.
    /// Returns the number of score records removed.
    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "delete_round", event_id = %event_id, round_number = round_number))]
    pub async fn delete_round(
        &self,
        actor: &Role,
        event_id: &EventId,
        round_number: u32,
    ) -> Result<usize> {
        access::require(actor, Operation::DeleteRound)?;
        let _section = self.lock_event(event_id).await;

        let current = self.round_at(event_id, round_number).await?;
        if !lifecycle::can_delete(&current) {
            return Err(RoundError::InvalidTransition {
                round_id: current.id.clone(),
                state: current.state(),
                operation: Operation::DeleteRound,
            });
        }

        let removed = self.store.delete_round(event_id, round_number).await?;
        obs::emit_round_deleted(event_id.as_str(), current.id.as_str(), removed);
        METRICS.inc_applied();
        Ok(removed)
    }

    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "update_criteria", round_id = %round_id, event_id = tracing::field::Empty))]
    pub async fn update_criteria(
        &self,
        actor: &Role,
        round_id: &RoundId,
        criteria: Vec<Criterion>,
    ) -> Result<Round> {
        access::require(actor, Operation::UpdateCriteria)?;
        let (_section, current) = self.lock_round(round_id).await?;
        obs::record_event(current.event_id.as_str());

        lifecycle::ensure_editable(&current, Operation::UpdateCriteria)?;
        validate_criteria(&criteria)?;

        let updated = self.store.update_round_criteria(round_id, criteria).await?;
        obs::emit_round_updated(current.event_id.as_str(), round_id.as_str());
        METRICS.inc_applied();
        Ok(updated)
    }

    /// Set a round's share of the event leaderboard. Allowed in any
    /// lifecycle state.
    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "set_round_weight", round_id = %round_id, event_id = tracing::field::Empty))]
    pub async fn set_round_weight(
        &self,
        actor: &Role,
        round_id: &RoundId,
        weight_percentage: f64,
    ) -> Result<Round> {
        access::require(actor, Operation::SetRoundWeight)?;
        validate_weight(weight_percentage)?;
        let (_section, current) = self.lock_round(round_id).await?;
        obs::record_event(current.event_id.as_str());

        let mut weighted = current;
        weighted.weight_percentage = weight_percentage;
        weighted.updated_at = Some(chrono::Utc::now());
        let stored = self.store.put_round(weighted).await?;
        obs::emit_round_weight_set(stored.event_id.as_str(), round_id.as_str(), weight_percentage);
        METRICS.inc_applied();
        Ok(stored)
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    /// Swap a round with its neighbour in `direction`.
    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "reorder_rounds", event_id = %event_id, round_id = %round_id, direction = %direction))]
    pub async fn move_round(
        &self,
        actor: &Role,
        event_id: &EventId,
        round_id: &RoundId,
        direction: Direction,
    ) -> Result<Event> {
        access::require(actor, Operation::ReorderRounds)?;
        let _section = self.lock_event(event_id).await;

        let event = self.store.get_event(event_id).await?;
        let batch = sequencer::move_round(&event, round_id, direction)?;
        self.commit_reorder(event_id, &batch).await
    }

    /// Commit a batch computed elsewhere against an earlier read.
    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "reorder_rounds", event_id = %batch.event_id))]
    pub async fn apply_reorder(&self, actor: &Role, batch: &ReorderBatch) -> Result<Event> {
        access::require(actor, Operation::ReorderRounds)?;
        let _section = self.lock_event(&batch.event_id).await;

        self.commit_reorder(&batch.event_id, batch).await
    }

    async fn commit_reorder(&self, event_id: &EventId, batch: &ReorderBatch) -> Result<Event> {
        match self.store.reorder_rounds(event_id, batch).await {
            Ok(event) => {
                obs::emit_round_reordered(event_id.as_str(), batch.edits.len(), batch.expected.short());
                METRICS.inc_reorders();
                METRICS.inc_applied();
                Ok(event)
            }
            Err(err @ RoundError::ConcurrentModification { .. }) => {
                obs::emit_reorder_conflict(event_id.as_str());
                METRICS.inc_conflicts();
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Freeze a round and capture its score statistics.
    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "freeze_round", round_id = %round_id, event_id = tracing::field::Empty))]
    pub async fn freeze_round(&self, actor: &Role, round_id: &RoundId) -> Result<Round> {
        access::require(actor, Operation::FreezeRound)?;
        let (_section, current) = self.lock_round(round_id).await?;
        obs::record_event(current.event_id.as_str());

        let mut frozen = lifecycle::freeze(&current)?;
        let scores = self.store.scores_for_round(round_id).await?;
        let stats = aggregator::round_stats(&scores);
        obs::emit_round_frozen(round_id.as_str(), stats.participated_count, stats.avg_score);
        frozen.stats = Some(stats);

        let stored = self.store.put_round(frozen).await?;
        METRICS.inc_applied();
        Ok(stored)
    }

    /// Finalize a frozen round without shortlisting.
    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "evaluate_round", round_id = %round_id, event_id = tracing::field::Empty))]
    pub async fn evaluate_round(&self, actor: &Role, round_id: &RoundId) -> Result<Round> {
        access::require(actor, Operation::EvaluateRound)?;
        let (_section, current) = self.lock_round(round_id).await?;
        obs::record_event(current.event_id.as_str());

        let evaluated = lifecycle::evaluate(&current)?;
        let stored = self.store.put_round(evaluated).await?;
        obs::emit_round_evaluated(round_id.as_str(), stored.shortlisted_teams().len());
        METRICS.inc_applied();
        Ok(stored)
    }

    /// Select advancing teams of a frozen round, then mark it Evaluated.
    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "shortlist", round_id = %round_id, event_id = tracing::field::Empty))]
    pub async fn shortlist(
        &self,
        actor: &Role,
        round_id: &RoundId,
        rule: ShortlistRule,
    ) -> Result<ShortlistOutcome> {
        access::require(actor, Operation::Shortlist)?;
        let (_section, current) = self.lock_round(round_id).await?;
        obs::record_event(current.event_id.as_str());

        let scores = self.store.scores_for_round(round_id).await?;
        let outcome = shortlist::shortlist(&current, &scores, rule, self.config.score_scale)?;
        let evaluated = shortlist::apply_outcome(&current, &outcome)?;
        self.store.put_round(evaluated).await?;

        obs::emit_round_evaluated(round_id.as_str(), outcome.shortlisted.len());
        METRICS.inc_applied();
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Scores
    // -----------------------------------------------------------------------

    /// Normalize and store one team's submission for an unfrozen round.
    #[instrument(name = "roundkeep.mutation", skip_all, fields(operation = "record_score", round_id = %round_id, team_id = %submission.team_id, event_id = tracing::field::Empty))]
    pub async fn record_score(
        &self,
        actor: &Role,
        round_id: &RoundId,
        submission: ScoreSubmission,
    ) -> Result<ScoreReceipt> {
        access::require(actor, Operation::RecordScore)?;
        submission.validate()?;
        let (_section, round) = self.lock_round(round_id).await?;
        obs::record_event(round.event_id.as_str());

        lifecycle::ensure_editable(&round, Operation::RecordScore)?;

        let normalized = aggregator::normalize(&submission, &round, self.config.score_scale);
        let mut record = TeamScore::empty(
            submission.team_id.clone(),
            round.id.clone(),
            round.event_id.clone(),
        );
        record.score = normalized.score;
        record.raw_total_score = normalized.raw_total;
        record.is_normalized = normalized.is_normalized;
        record.is_present = submission.is_present;
        record.criteria_scores = Some(submission.criteria_scores);

        let warnings = aggregator::integrity_warnings(&record, &round, self.config.sum_tolerance);
        if self.config.warn_on_integrity {
            for warning in &warnings {
                obs::emit_integrity_warning(warning);
            }
        }
        METRICS.add_integrity_warnings(warnings.len() as u64);
        let stored = self.store.upsert_score(record).await?;
        obs::emit_score_recorded(round_id.as_str(), stored.team_id.as_str(), stored.score);
        METRICS.inc_applied();
        Ok(ScoreReceipt {
            score: stored,
            warnings,
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn rounds(&self, event_id: &EventId) -> Result<Vec<Round>> {
        self.store.list_rounds_for_event(event_id).await
    }

    pub async fn event(&self, event_id: &EventId) -> Result<Event> {
        self.store.get_event(event_id).await
    }

    pub async fn round_details(&self, round_id: &RoundId) -> Result<Round> {
        self.store.get_round_details(round_id).await
    }

    pub async fn leaderboard(&self, round_id: &RoundId) -> Result<Vec<LeaderboardRow>> {
        let scores = self.store.scores_for_round(round_id).await?;
        Ok(aggregator::leaderboard(&scores))
    }

    /// Weighted standings across the event's evaluated rounds.
    pub async fn event_leaderboard(&self, event_id: &EventId) -> Result<Vec<EventLeaderboardRow>> {
        let rounds = self.store.list_rounds_for_event(event_id).await?;
        let mut scores = Vec::new();
        for round in &rounds {
            scores.extend(self.store.scores_for_round(&round.id).await?);
        }
        Ok(aggregator::event_leaderboard(
            &rounds,
            &scores,
            self.config.score_scale,
        ))
    }

    /// Stats captured at freeze time, or computed live for an open round.
    pub async fn round_stats(&self, round_id: &RoundId) -> Result<RoundStats> {
        let round = self.store.get_round_details(round_id).await?;
        if let Some(stats) = round.stats() {
            return Ok(stats.clone());
        }
        let scores = self.store.scores_for_round(round_id).await?;
        Ok(aggregator::round_stats(&scores))
    }

    /// Display data for every score of a round, best first. Read-only: the
    /// warnings are recomputed but neither logged nor counted.
    pub async fn score_views(&self, round_id: &RoundId) -> Result<Vec<ScoreView>> {
        let round = self.store.get_round_details(round_id).await?;
        let mut scores = self.store.scores_for_round(round_id).await?;
        scores.sort_by(aggregator::ranking_order);
        let max_possible = aggregator::max_possible_points(round.criteria());

        let views = scores
            .into_iter()
            .map(|score| {
                let warnings =
                    aggregator::integrity_warnings(&score, &round, self.config.sum_tolerance);
                ScoreView {
                    label: aggregator::presentation_label(&score),
                    within_bounds: aggregator::is_within_bounds(&score, &round),
                    max_possible,
                    warnings,
                    score,
                }
            })
            .collect::<Vec<_>>();
        debug!(round_id = %round_id, views = views.len(), "built score views");
        Ok(views)
    }

    async fn round_at(&self, event_id: &EventId, round_number: u32) -> Result<Round> {
        let event = self.store.get_event(event_id).await?;
        event
            .round_by_number(round_number)
            .cloned()
            .ok_or_else(|| RoundError::RoundNotFound(format!("{event_id}#{round_number}")))
    }
}
