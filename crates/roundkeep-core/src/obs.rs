//! Structured log events for round mutations.
//!
//! Every helper emits one `tracing` event with a stable `event` field, so
//! log pipelines can filter on e.g. `event=round.reordered`.

use tracing::{info, warn};

use crate::access::Operation;
use crate::aggregator::IntegrityWarning;

/// Attach the owning event to the current mutation span once it is known.
pub fn record_event(event_id: &str) {
    tracing::Span::current().record("event_id", event_id);
}

pub fn emit_access_denied(role: &str, operation: Operation) {
    warn!(event = "access.denied", role = %role, operation = %operation);
}

pub fn emit_event_created(event_id: &str, rounds: usize) {
    info!(event = "event.created", event_id = %event_id, rounds = rounds);
}

pub fn emit_round_created(event_id: &str, round_id: &str, round_number: u32) {
    info!(event = "round.created", event_id = %event_id, round_id = %round_id, round_number = round_number);
}

pub fn emit_round_updated(event_id: &str, round_id: &str) {
    info!(event = "round.updated", event_id = %event_id, round_id = %round_id);
}

pub fn emit_round_weight_set(event_id: &str, round_id: &str, weight_percentage: f64) {
    info!(
        event = "round.weight_set",
        event_id = %event_id,
        round_id = %round_id,
        weight_percentage = weight_percentage,
    );
}

pub fn emit_round_deleted(event_id: &str, round_id: &str, scores_removed: usize) {
    info!(
        event = "round.deleted",
        event_id = %event_id,
        round_id = %round_id,
        scores_removed = scores_removed,
    );
}

pub fn emit_round_reordered(event_id: &str, edits: usize, token: &str) {
    info!(event = "round.reordered", event_id = %event_id, edits = edits, token = %token);
}

pub fn emit_reorder_conflict(event_id: &str) {
    warn!(event = "round.reorder_conflict", event_id = %event_id);
}

pub fn emit_round_frozen(round_id: &str, participated: usize, avg_score: f64) {
    info!(
        event = "round.frozen",
        round_id = %round_id,
        participated = participated,
        avg_score = avg_score,
    );
}

pub fn emit_round_evaluated(round_id: &str, shortlisted: usize) {
    info!(event = "round.evaluated", round_id = %round_id, shortlisted = shortlisted);
}

pub fn emit_score_recorded(round_id: &str, team_id: &str, score: f64) {
    info!(event = "score.recorded", round_id = %round_id, team_id = %team_id, score = score);
}

pub fn emit_integrity_warning(warning: &IntegrityWarning) {
    warn!(event = "score.integrity_warning", detail = %warning);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_event_outside_span() {
        record_event("EVT01");
        emit_access_denied("judge", Operation::DeleteRound);
    }
}
