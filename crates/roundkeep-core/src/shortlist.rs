//! Shortlisting: the evaluation step that closes a frozen round.

use serde::{Deserialize, Serialize};

use crate::access::Operation;
use crate::aggregator::ranking_order;
use crate::error::{Result, RoundError};
use crate::lifecycle::{self, RoundState};
use crate::model::{Round, TeamId, TeamScore};

/// How advancing teams are selected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ShortlistRule {
    /// The `k` best-ranked teams advance.
    TopK(usize),
    /// Teams with `score >= threshold` advance.
    Threshold(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistOutcome {
    pub rule: ShortlistRule,
    /// Advancing teams, best first.
    pub shortlisted: Vec<TeamId>,
    pub eliminated: Vec<TeamId>,
}

/// Split a frozen round's teams into advancing and eliminated.
pub fn shortlist(
    round: &Round,
    scores: &[TeamScore],
    rule: ShortlistRule,
    scale: f64,
) -> Result<ShortlistOutcome> {
    if round.state() != RoundState::Frozen {
        return Err(RoundError::InvalidTransition {
            round_id: round.id.clone(),
            state: round.state(),
            operation: Operation::Shortlist,
        });
    }
    if scores.is_empty() {
        return Err(RoundError::InvalidShortlist(format!(
            "round {} has no scored teams",
            round.id
        )));
    }

    let mut ranked: Vec<&TeamScore> = scores.iter().collect();
    ranked.sort_by(|a, b| ranking_order(a, b));

    let (shortlisted, eliminated): (Vec<&TeamScore>, Vec<&TeamScore>) = match rule {
        ShortlistRule::TopK(k) => {
            if k == 0 || k > ranked.len() {
                return Err(RoundError::InvalidShortlist(format!(
                    "top_k must be between 1 and {}, got {k}",
                    ranked.len()
                )));
            }
            let rest = ranked.split_off(k);
            (ranked, rest)
        }
        ShortlistRule::Threshold(threshold) => {
            if !(0.0..=scale).contains(&threshold) {
                return Err(RoundError::InvalidShortlist(format!(
                    "threshold must be between 0 and {scale}, got {threshold}"
                )));
            }
            ranked.into_iter().partition(|s| s.score >= threshold)
        }
    };

    Ok(ShortlistOutcome {
        rule,
        shortlisted: shortlisted.into_iter().map(|s| s.team_id.clone()).collect(),
        eliminated: eliminated.into_iter().map(|s| s.team_id.clone()).collect(),
    })
}

/// Record the outcome on the round and move it to Evaluated.
pub fn apply_outcome(round: &Round, outcome: &ShortlistOutcome) -> Result<Round> {
    let mut evaluated = lifecycle::evaluate(round)?;
    evaluated.shortlisted_teams = outcome.shortlisted.clone();
    Ok(evaluated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventId, RoundCreateFields, RoundId, RoundMode, RoundType};

    fn frozen_round() -> Round {
        let round = Round::new(
            RoundId::from("r-1"),
            EventId::from("EVT01"),
            1,
            RoundCreateFields::new("Prelims", RoundType::Title, RoundMode::Offline),
        );
        lifecycle::freeze(&round).unwrap()
    }

    fn scores() -> Vec<TeamScore> {
        [("t1", 72.0), ("t2", 91.0), ("t3", 40.0), ("t4", 72.0)]
            .into_iter()
            .map(|(team, value)| {
                let mut s = TeamScore::empty(TeamId::from(team), RoundId::from("r-1"), EventId::from("EVT01"));
                s.score = value;
                s
            })
            .collect()
    }

    fn names(ids: &[TeamId]) -> Vec<&str> {
        ids.iter().map(|t| t.as_str()).collect()
    }

    #[test]
    fn test_top_k() {
        let outcome = shortlist(&frozen_round(), &scores(), ShortlistRule::TopK(2), 100.0).unwrap();
        assert_eq!(names(&outcome.shortlisted), vec!["t2", "t1"]);
        assert_eq!(names(&outcome.eliminated), vec!["t4", "t3"]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let outcome =
            shortlist(&frozen_round(), &scores(), ShortlistRule::Threshold(72.0), 100.0).unwrap();
        assert_eq!(names(&outcome.shortlisted), vec!["t2", "t1", "t4"]);
        assert_eq!(names(&outcome.eliminated), vec!["t3"]);
    }

    #[test]
    fn test_invalid_parameters() {
        let round = frozen_round();
        assert!(matches!(
            shortlist(&round, &scores(), ShortlistRule::TopK(0), 100.0),
            Err(RoundError::InvalidShortlist(_))
        ));
        assert!(shortlist(&round, &scores(), ShortlistRule::TopK(5), 100.0).is_err());
        assert!(shortlist(&round, &scores(), ShortlistRule::Threshold(101.0), 100.0).is_err());
        assert!(shortlist(&round, &[], ShortlistRule::TopK(1), 100.0).is_err());
    }

    #[test]
    fn test_requires_frozen_round() {
        let active = Round::new(
            RoundId::from("r-2"),
            EventId::from("EVT01"),
            2,
            RoundCreateFields::new("Finals", RoundType::Title, RoundMode::Offline),
        );
        let err = shortlist(&active, &scores(), ShortlistRule::TopK(1), 100.0).unwrap_err();
        assert!(matches!(err, RoundError::InvalidTransition { .. }));
    }

    #[test]
    fn test_apply_outcome_evaluates_round() {
        let round = frozen_round();
        let outcome = shortlist(&round, &scores(), ShortlistRule::TopK(1), 100.0).unwrap();
        let evaluated = apply_outcome(&round, &outcome).unwrap();
        assert!(evaluated.is_evaluated());
        assert!(evaluated.is_frozen());
        assert_eq!(names(evaluated.shortlisted_teams()), vec!["t2"]);

        let err = shortlist(&evaluated, &scores(), ShortlistRule::TopK(1), 100.0).unwrap_err();
        assert!(matches!(
            err,
            RoundError::InvalidTransition {
                state: RoundState::Evaluated,
                ..
            }
        ));
    }
}
