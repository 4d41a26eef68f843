//! Score aggregation.
//!
//! Pure functions that derive display and ranking quantities from a round's
//! criteria and its team score records. Nothing here performs I/O or
//! mutates its inputs.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{Criterion, Round, RoundId, RoundStats, ScoreSubmission, TeamId, TeamScore};

/// Sum of `max_points` over the rubric. Zero for an empty rubric.
pub fn max_possible_points(criteria: &[Criterion]) -> f64 {
    criteria.iter().map(|c| c.max_points).sum()
}

/// Whether the raw total lies within `0..=max_possible_points`.
///
/// A round without criteria declares no ceiling, so any score is in bounds.
pub fn is_within_bounds(score: &TeamScore, round: &Round) -> bool {
    if round.criteria().is_empty() {
        return true;
    }
    let max = max_possible_points(round.criteria());
    score.raw_total_score >= 0.0 && score.raw_total_score <= max
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelKind {
    Present,
    Normalized,
}

impl std::fmt::Display for LabelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelKind::Present => write!(f, "Present"),
            LabelKind::Normalized => write!(f, "Normalized"),
        }
    }
}

/// The single boolean badge shown next to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationLabel {
    pub label: LabelKind,
    pub value: bool,
}

/// Pick `is_present` when the record carries it, else `is_normalized`.
pub fn presentation_label(score: &TeamScore) -> PresentationLabel {
    match score.is_present {
        Some(present) => PresentationLabel {
            label: LabelKind::Present,
            value: present,
        },
        None => PresentationLabel {
            label: LabelKind::Normalized,
            value: score.is_normalized,
        },
    }
}

/// Non-fatal data-integrity findings on a score record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityWarning {
    /// A criterion key that the round's rubric does not define.
    OrphanCriterion {
        round_id: RoundId,
        team_id: TeamId,
        criterion: String,
    },
    /// `raw_total_score` disagrees with the sum of `criteria_scores`.
    RawTotalMismatch {
        team_id: TeamId,
        declared: f64,
        computed: f64,
    },
    OutOfBounds {
        team_id: TeamId,
        raw_total: f64,
        max_possible: f64,
    },
}

impl std::fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityWarning::OrphanCriterion {
                round_id,
                team_id,
                criterion,
            } => write!(
                f,
                "team {team_id} scored criterion '{criterion}' not defined on round {round_id}"
            ),
            IntegrityWarning::RawTotalMismatch {
                team_id,
                declared,
                computed,
            } => write!(
                f,
                "team {team_id} raw total {declared} differs from criteria sum {computed}"
            ),
            IntegrityWarning::OutOfBounds {
                team_id,
                raw_total,
                max_possible,
            } => write!(
                f,
                "team {team_id} raw total {raw_total} outside 0..={max_possible}"
            ),
        }
    }
}

/// Collect every integrity finding for `score` against `round`.
///
/// The record is never altered; callers render whatever was submitted.
pub fn integrity_warnings(score: &TeamScore, round: &Round, tolerance: f64) -> Vec<IntegrityWarning> {
    let mut warnings = Vec::new();

    if let Some(criteria_scores) = &score.criteria_scores {
        for key in criteria_scores.keys() {
            if !round.criteria().iter().any(|c| &c.name == key) {
                warnings.push(IntegrityWarning::OrphanCriterion {
                    round_id: round.id.clone(),
                    team_id: score.team_id.clone(),
                    criterion: key.clone(),
                });
            }
        }

        let computed: f64 = criteria_scores.values().sum();
        if (computed - score.raw_total_score).abs() > tolerance {
            warnings.push(IntegrityWarning::RawTotalMismatch {
                team_id: score.team_id.clone(),
                declared: score.raw_total_score,
                computed,
            });
        }
    }

    if !is_within_bounds(score, round) {
        warnings.push(IntegrityWarning::OutOfBounds {
            team_id: score.team_id.clone(),
            raw_total: score.raw_total_score,
            max_possible: max_possible_points(round.criteria()),
        });
    }

    warnings
}

/// Result of normalizing one submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScore {
    pub raw_total: f64,
    pub score: f64,
    pub is_normalized: bool,
}

/// Sum the submitted points and scale them onto `0..=scale`.
///
/// With criteria, `score = raw / max_possible * scale`. Without criteria,
/// the raw total is taken as already on the scale. Both are capped at `scale`.
pub fn normalize(submission: &ScoreSubmission, round: &Round, scale: f64) -> NormalizedScore {
    let raw_total: f64 = submission.criteria_scores.values().sum();
    let max = max_possible_points(round.criteria());

    let score = if max > 0.0 {
        (raw_total / max) * scale
    } else {
        raw_total
    };

    NormalizedScore {
        raw_total,
        score: score.min(scale),
        is_normalized: true,
    }
}

/// One row of a round leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub team_id: TeamId,
    pub score: f64,
    pub raw_total_score: f64,
    pub is_normalized: bool,
    pub criteria_scores: Option<BTreeMap<String, f64>>,
}

/// NaN ranks below every number so stored garbage never leads a board.
fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Score descending, ties by team id. Total over every `f64`, NaN included.
pub(crate) fn ranking_order(a: &TeamScore, b: &TeamScore) -> Ordering {
    rank_key(b.score)
        .total_cmp(&rank_key(a.score))
        .then_with(|| a.team_id.cmp(&b.team_id))
}

/// Rank scores by normalized score, 1-based.
pub fn leaderboard(scores: &[TeamScore]) -> Vec<LeaderboardRow> {
    let mut sorted: Vec<&TeamScore> = scores.iter().collect();
    sorted.sort_by(|a, b| ranking_order(a, b));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, s)| LeaderboardRow {
            rank: i + 1,
            team_id: s.team_id.clone(),
            score: s.score,
            raw_total_score: s.raw_total_score,
            is_normalized: s.is_normalized,
            criteria_scores: s.criteria_scores.clone(),
        })
        .collect()
}

/// A team's 1-based rank, or `None` if it has no score record.
pub fn rank_of(scores: &[TeamScore], team_id: &TeamId) -> Option<usize> {
    leaderboard(scores)
        .into_iter()
        .find(|row| &row.team_id == team_id)
        .map(|row| row.rank)
}

/// One team's standing across the evaluated rounds of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLeaderboardRow {
    pub rank: usize,
    pub team_id: TeamId,
    /// Weighted average of the team's round scores.
    pub weighted_average: f64,
    /// `weighted_average` rescaled so the leading team sits at `scale`.
    pub final_score: f64,
    /// Evaluated rounds in which the team has a score record.
    pub rounds_scored: usize,
}

/// Weighted standings over every evaluated round in `rounds`.
///
/// Teams are those with any record in `scores`. A team without a record
/// for an evaluated round counts 0 there. Each round contributes
/// `score * weight_percentage / 100`, divided by the summed weights, and the
/// averages are then rescaled so the best team reaches `scale`. With no
/// evaluated round the board is empty.
pub fn event_leaderboard(rounds: &[Round], scores: &[TeamScore], scale: f64) -> Vec<EventLeaderboardRow> {
    let evaluated: Vec<&Round> = rounds.iter().filter(|r| r.is_evaluated()).collect();
    if evaluated.is_empty() {
        return Vec::new();
    }

    let mut by_round: HashMap<(&RoundId, &TeamId), f64> = HashMap::new();
    let mut teams: BTreeSet<&TeamId> = BTreeSet::new();
    for s in scores {
        teams.insert(&s.team_id);
        let value = if s.score.is_finite() { s.score } else { 0.0 };
        by_round.insert((&s.round_id, &s.team_id), value);
    }

    let total_weight: f64 = evaluated.iter().map(|r| r.weight_percentage() / 100.0).sum();
    if total_weight <= 0.0 {
        return Vec::new();
    }

    let mut rows: Vec<EventLeaderboardRow> = teams
        .into_iter()
        .map(|team_id| {
            let mut weighted = 0.0;
            let mut rounds_scored = 0;
            for round in &evaluated {
                if let Some(value) = by_round.get(&(&round.id, team_id)) {
                    weighted += value * round.weight_percentage() / 100.0;
                    rounds_scored += 1;
                }
            }
            EventLeaderboardRow {
                rank: 0,
                team_id: team_id.clone(),
                weighted_average: weighted / total_weight,
                final_score: 0.0,
                rounds_scored,
            }
        })
        .collect();

    let best = rows
        .iter()
        .map(|r| r.weighted_average)
        .fold(0.0_f64, f64::max);
    for row in &mut rows {
        row.final_score = if best > 0.0 {
            row.weighted_average / best * scale
        } else {
            0.0
        };
    }

    rows.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| a.team_id.cmp(&b.team_id))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}

/// Max/min/average over non-zero scores, and the number of records.
pub fn round_stats(scores: &[TeamScore]) -> RoundStats {
    let non_zero: Vec<f64> = scores
        .iter()
        .map(|s| s.score)
        .filter(|s| *s > 0.0)
        .collect();

    if non_zero.is_empty() {
        return RoundStats {
            participated_count: scores.len(),
            ..RoundStats::default()
        };
    }

    let max_score = non_zero.iter().copied().fold(f64::MIN, f64::max);
    let min_score = non_zero.iter().copied().fold(f64::MAX, f64::min);
    let avg_score = non_zero.iter().sum::<f64>() / non_zero.len() as f64;

    RoundStats {
        max_score,
        min_score,
        avg_score,
        participated_count: scores.len(),
    }
}
