//! Team score records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoundError};
use crate::model::ids::{EventId, RoundId, ScoreId, TeamId};

/// One team's result for one round.
///
/// Exactly one of `is_present` / `is_normalized` is authoritative for
/// display; records produced by attendance-tracked rounds carry
/// `is_present`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamScore {
    pub id: ScoreId,
    pub team_id: TeamId,
    pub round_id: RoundId,
    pub event_id: EventId,
    /// Normalized score on the configured scale.
    pub score: f64,
    /// Sum of the awarded per-criterion points.
    pub raw_total_score: f64,
    #[serde(default)]
    pub criteria_scores: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub is_normalized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_present: Option<bool>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TeamScore {
    /// Zero-valued record, as created when a team is enrolled in a round.
    pub fn empty(team_id: TeamId, round_id: RoundId, event_id: EventId) -> Self {
        Self {
            id: ScoreId::new(),
            team_id,
            round_id,
            event_id,
            score: 0.0,
            raw_total_score: 0.0,
            criteria_scores: None,
            is_normalized: false,
            is_present: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// Per-criterion points submitted for one team by the scoring workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub team_id: TeamId,
    pub criteria_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub is_present: Option<bool>,
}

impl ScoreSubmission {
    pub fn new(team_id: impl Into<TeamId>) -> Self {
        Self {
            team_id: team_id.into(),
            criteria_scores: BTreeMap::new(),
            is_present: None,
        }
    }

    pub fn with_points(mut self, criterion: impl Into<String>, points: f64) -> Self {
        self.criteria_scores.insert(criterion.into(), points);
        self
    }

    pub fn with_presence(mut self, present: bool) -> Self {
        self.is_present = Some(present);
        self
    }

    /// Every awarded value, and their total, must be a finite number.
    ///
    /// Negative points are accepted here and surface as an out-of-bounds
    /// integrity warning instead.
    pub fn validate(&self) -> Result<()> {
        for (criterion, points) in &self.criteria_scores {
            if !points.is_finite() {
                return Err(RoundError::InvalidScore(format!(
                    "team {} criterion '{}' has non-finite points {}",
                    self.team_id, criterion, points
                )));
            }
        }
        let total: f64 = self.criteria_scores.values().sum();
        if !total.is_finite() {
            return Err(RoundError::InvalidScore(format!(
                "team {} points overflow to {}",
                self.team_id, total
            )));
        }
        Ok(())
    }
}
