//! Round records and their editable field sets.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, RoundError};
use crate::lifecycle::RoundState;
use crate::model::ids::{EventId, RoundId, TeamId};

/// Competition format of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundType {
    Title,
    Rolling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundMode {
    Online,
    Offline,
}

/// Informational schedule status. Independent of the lifecycle flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    #[default]
    Upcoming,
    InProgress,
    Completed,
}

/// One weighted component of a round's scoring rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub max_points: f64,
}

impl Criterion {
    pub fn new(name: impl Into<String>, max_points: f64) -> Self {
        Self {
            name: name.into(),
            max_points,
        }
    }
}

/// Check a rubric: names non-empty and unique, every `max_points > 0`.
pub fn validate_criteria(criteria: &[Criterion]) -> Result<()> {
    let mut seen = HashSet::new();
    for criterion in criteria {
        if criterion.name.trim().is_empty() {
            return Err(RoundError::InvalidCriteria(
                "criterion name must not be empty".to_string(),
            ));
        }
        if !criterion.max_points.is_finite() || criterion.max_points <= 0.0 {
            return Err(RoundError::InvalidCriteria(format!(
                "criterion '{}' has max_points {}; must be a positive number",
                criterion.name, criterion.max_points
            )));
        }
        if !seen.insert(criterion.name.as_str()) {
            return Err(RoundError::InvalidCriteria(format!(
                "duplicate criterion name '{}'",
                criterion.name
            )));
        }
    }
    Ok(())
}

/// Weight of a round that has never been given one.
pub const DEFAULT_WEIGHT_PERCENTAGE: f64 = 100.0;
pub const MIN_WEIGHT_PERCENTAGE: f64 = 25.0;
pub const MAX_WEIGHT_PERCENTAGE: f64 = 200.0;

fn default_weight() -> f64 {
    DEFAULT_WEIGHT_PERCENTAGE
}

/// A round weight must lie in `25..=200` percent.
pub fn validate_weight(weight_percentage: f64) -> Result<()> {
    if !weight_percentage.is_finite()
        || !(MIN_WEIGHT_PERCENTAGE..=MAX_WEIGHT_PERCENTAGE).contains(&weight_percentage)
    {
        return Err(RoundError::InvalidWeight(format!(
            "weight_percentage {} outside {}..={}",
            weight_percentage, MIN_WEIGHT_PERCENTAGE, MAX_WEIGHT_PERCENTAGE
        )));
    }
    Ok(())
}

/// Score statistics captured when a round is frozen.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoundStats {
    pub max_score: f64,
    pub min_score: f64,
    pub avg_score: f64,
    pub participated_count: usize,
}

/// A scored stage of an event.
///
/// `round_number` is changed only by the sequencer, and the lifecycle
/// flags only by [`crate::lifecycle`]; both are read through getters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub event_id: EventId,
    pub(crate) round_number: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub round_type: RoundType,
    pub mode: RoundMode,
    #[serde(default)]
    pub club: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extended_description: Option<String>,
    #[serde(default)]
    pub form_link: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub status: RoundStatus,
    #[serde(default)]
    pub(crate) is_frozen: bool,
    #[serde(default)]
    pub(crate) is_evaluated: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub(crate) criteria: Vec<Criterion>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub(crate) shortlisted_teams: Vec<TeamId>,
    #[serde(default)]
    pub(crate) stats: Option<RoundStats>,
    /// Share of this round in the event leaderboard, in percent.
    #[serde(default = "default_weight")]
    pub(crate) weight_percentage: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Round {
    /// Build a fresh Active round at `round_number`.
    pub fn new(
        id: RoundId,
        event_id: EventId,
        round_number: u32,
        fields: RoundCreateFields,
    ) -> Self {
        Self {
            id,
            event_id,
            round_number,
            name: fields.name,
            round_type: fields.round_type,
            mode: fields.mode,
            club: fields.club,
            date: fields.date,
            venue: fields.venue,
            description: fields.description,
            extended_description: fields.extended_description,
            form_link: fields.form_link,
            contact: fields.contact,
            status: fields.status,
            is_frozen: false,
            is_evaluated: false,
            criteria: fields.criteria,
            shortlisted_teams: Vec::new(),
            stats: None,
            weight_percentage: DEFAULT_WEIGHT_PERCENTAGE,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn is_frozen(&self) -> bool {
        self.is_frozen
    }

    pub fn is_evaluated(&self) -> bool {
        self.is_evaluated
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn shortlisted_teams(&self) -> &[TeamId] {
        &self.shortlisted_teams
    }

    pub fn stats(&self) -> Option<&RoundStats> {
        self.stats.as_ref()
    }

    pub fn weight_percentage(&self) -> f64 {
        self.weight_percentage
    }

    /// Current lifecycle state derived from the flags.
    pub fn state(&self) -> RoundState {
        crate::lifecycle::status_label(self)
    }

    /// Verify the record-level invariants of a round.
    pub fn check_invariants(&self) -> Result<()> {
        if self.is_evaluated && !self.is_frozen {
            return Err(RoundError::InvalidRound {
                round_id: self.id.clone(),
                reason: "evaluated round must also be frozen".to_string(),
            });
        }
        if self.round_number == 0 {
            return Err(RoundError::InvalidRound {
                round_id: self.id.clone(),
                reason: "round_number is 1-based".to_string(),
            });
        }
        validate_weight(self.weight_percentage).map_err(|e| RoundError::InvalidRound {
            round_id: self.id.clone(),
            reason: e.to_string(),
        })?;
        validate_criteria(&self.criteria).map_err(|e| RoundError::InvalidRound {
            round_id: self.id.clone(),
            reason: e.to_string(),
        })
    }

    /// Overwrite every field present in `fields`, then reset those in `clear`.
    pub(crate) fn apply_edits(&mut self, fields: RoundEditableFields) {
        let RoundEditableFields {
            name,
            round_type,
            mode,
            club,
            date,
            venue,
            description,
            extended_description,
            form_link,
            contact,
            status,
            clear,
        } = fields;

        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = round_type {
            self.round_type = v;
        }
        if let Some(v) = mode {
            self.mode = v;
        }
        if club.is_some() {
            self.club = club;
        }
        if date.is_some() {
            self.date = date;
        }
        if venue.is_some() {
            self.venue = venue;
        }
        if description.is_some() {
            self.description = description;
        }
        if extended_description.is_some() {
            self.extended_description = extended_description;
        }
        if form_link.is_some() {
            self.form_link = form_link;
        }
        if contact.is_some() {
            self.contact = contact;
        }
        if let Some(v) = status {
            self.status = v;
        }
        for field in clear {
            match field {
                OptionalField::Club => self.club = None,
                OptionalField::Date => self.date = None,
                OptionalField::Venue => self.venue = None,
                OptionalField::Description => self.description = None,
                OptionalField::ExtendedDescription => self.extended_description = None,
                OptionalField::FormLink => self.form_link = None,
                OptionalField::Contact => self.contact = None,
            }
        }
        self.updated_at = Some(Utc::now());
    }
}

/// Fields supplied by the caller when creating a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundCreateFields {
    pub name: String,
    #[serde(rename = "type")]
    pub round_type: RoundType,
    pub mode: RoundMode,
    #[serde(default)]
    pub club: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extended_description: Option<String>,
    #[serde(default)]
    pub form_link: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub status: RoundStatus,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
}

impl RoundCreateFields {
    pub fn new(name: impl Into<String>, round_type: RoundType, mode: RoundMode) -> Self {
        Self {
            name: name.into(),
            round_type,
            mode,
            club: None,
            date: None,
            venue: None,
            description: None,
            extended_description: None,
            form_link: None,
            contact: None,
            status: RoundStatus::Upcoming,
            criteria: Vec::new(),
        }
    }

    pub fn with_criteria(mut self, criteria: Vec<Criterion>) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_club(mut self, club: impl Into<String>) -> Self {
        self.club = Some(club.into());
        self
    }
}

/// Optional descriptive fields that an edit can reset to empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalField {
    Club,
    Date,
    Venue,
    Description,
    ExtendedDescription,
    FormLink,
    Contact,
}

/// Partial update of a round's descriptive fields. `None` leaves a field as is;
/// fields named in `clear` are reset after the updates are applied.
///
/// Ordering, lifecycle flags and criteria have their own operations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoundEditableFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub round_type: Option<RoundType>,
    #[serde(default)]
    pub mode: Option<RoundMode>,
    #[serde(default)]
    pub club: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extended_description: Option<String>,
    #[serde(default)]
    pub form_link: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub status: Option<RoundStatus>,
    #[serde(default)]
    pub clear: Vec<OptionalField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_round() -> Round {
        Round::new(
            RoundId::from("r-1"),
            EventId::from("EVT01"),
            1,
            RoundCreateFields::new("Prelims", RoundType::Title, RoundMode::Offline),
        )
    }

    #[test]
    fn test_new_round_starts_active() {
        let round = sample_round();
        assert!(!round.is_frozen());
        assert!(!round.is_evaluated());
        assert_eq!(round.state(), RoundState::Active);
        assert!(round.check_invariants().is_ok());
    }

    #[test]
    fn test_evaluated_without_frozen_is_rejected() {
        let mut round = sample_round();
        round.is_evaluated = true;
        let err = round.check_invariants().unwrap_err();
        assert!(matches!(err, RoundError::InvalidRound { .. }));
    }

    #[test]
    fn test_validate_criteria_rejects_non_positive_and_duplicates() {
        assert!(validate_criteria(&[Criterion::new("Clarity", 0.0)]).is_err());
        assert!(validate_criteria(&[Criterion::new("Clarity", -5.0)]).is_err());
        assert!(validate_criteria(&[
            Criterion::new("Clarity", 10.0),
            Criterion::new("Clarity", 20.0)
        ])
        .is_err());
        assert!(validate_criteria(&[Criterion::new("  ", 10.0)]).is_err());
        assert!(validate_criteria(&[
            Criterion::new("Clarity", 50.0),
            Criterion::new("Originality", 50.0)
        ])
        .is_ok());
        assert!(validate_criteria(&[]).is_ok());
    }

    #[test]
    fn test_null_criteria_deserializes_as_empty() {
        let json = serde_json::json!({
            "id": "r-9",
            "event_id": "EVT01",
            "round_number": 1,
            "name": "Finals",
            "type": "rolling",
            "mode": "online",
            "criteria": null,
            "created_at": "2025-01-01T00:00:00Z"
        });
        let round: Round = serde_json::from_value(json).unwrap();
        assert!(round.criteria().is_empty());
        assert_eq!(round.round_type, RoundType::Rolling);
        assert_eq!(round.status, RoundStatus::Upcoming);
    }

    #[test]
    fn test_apply_edits_only_touches_present_fields() {
        let mut round = sample_round();
        round.venue = Some("Hall A".to_string());
        round.apply_edits(RoundEditableFields {
            name: Some("Quarterfinals".to_string()),
            status: Some(RoundStatus::InProgress),
            ..Default::default()
        });
        assert_eq!(round.name, "Quarterfinals");
        assert_eq!(round.status, RoundStatus::InProgress);
        assert_eq!(round.venue.as_deref(), Some("Hall A"));
        assert!(round.updated_at.is_some());
    }

    #[test]
    fn test_apply_edits_clears_named_fields() {
        let mut round = sample_round();
        round.venue = Some("Hall A".to_string());
        round.form_link = Some("https://forms.example/round1".to_string());
        round.contact = Some("desk@example.org".to_string());
        round.apply_edits(RoundEditableFields {
            contact: Some("judges@example.org".to_string()),
            clear: vec![OptionalField::Venue, OptionalField::FormLink],
            ..Default::default()
        });
        assert_eq!(round.venue, None);
        assert_eq!(round.form_link, None);
        assert_eq!(round.contact.as_deref(), Some("judges@example.org"));
    }

    #[test]
    fn test_clear_list_deserializes_snake_case() {
        let fields: RoundEditableFields =
            serde_json::from_value(serde_json::json!({ "clear": ["extended_description", "date"] }))
                .unwrap();
        assert_eq!(
            fields.clear,
            vec![OptionalField::ExtendedDescription, OptionalField::Date]
        );
    }

    #[test]
    fn test_weight_defaults_and_bounds() {
        let json = serde_json::json!({
            "id": "r-9",
            "event_id": "EVT01",
            "round_number": 1,
            "name": "Finals",
            "type": "title",
            "mode": "offline",
            "created_at": "2025-01-01T00:00:00Z"
        });
        let round: Round = serde_json::from_value(json).unwrap();
        assert_eq!(round.weight_percentage(), DEFAULT_WEIGHT_PERCENTAGE);

        assert!(validate_weight(25.0).is_ok());
        assert!(validate_weight(200.0).is_ok());
        assert!(validate_weight(10.0).is_err());
        assert!(validate_weight(f64::NAN).is_err());

        let mut heavy = sample_round();
        heavy.weight_percentage = 500.0;
        assert!(matches!(
            heavy.check_invariants(),
            Err(RoundError::InvalidRound { .. })
        ));
    }
}
