//! Role gate for round mutations.
//!
//! Default-deny: only [`Role::Admin`] may mutate rounds. Callers must run
//! [`require`] before reading or writing any state so that a denied call
//! has no side effects.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoundError};

/// The actor's role as reported by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Event organisers with full control over rounds.
    Admin,
    /// Club coordinators running individual rounds.
    Club,
    Judge,
    Participant,
    /// Any role string this engine does not know.
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Club => "clubs",
            Role::Judge => "judge",
            Role::Participant => "participant",
            Role::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "pda" => Role::Admin,
            "club" | "clubs" => Role::Club,
            "judge" => Role::Judge,
            "participant" | "student" | "team" => Role::Participant,
            _ => Role::Other(s.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::from(s.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutating operations on events and their rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateEvent,
    CreateRound,
    EditRound,
    DeleteRound,
    ReorderRounds,
    UpdateCriteria,
    FreezeRound,
    EvaluateRound,
    RecordScore,
    Shortlist,
    SetRoundWeight,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::CreateEvent => "create event",
            Operation::CreateRound => "create round",
            Operation::EditRound => "edit round",
            Operation::DeleteRound => "delete round",
            Operation::ReorderRounds => "reorder rounds",
            Operation::UpdateCriteria => "update criteria",
            Operation::FreezeRound => "freeze round",
            Operation::EvaluateRound => "evaluate round",
            Operation::RecordScore => "record score",
            Operation::Shortlist => "shortlist teams",
            Operation::SetRoundWeight => "set round weight",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    InsufficientRole,
}

/// Outcome of [`authorize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    Deny { reason: DenyReason },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Decide whether `role` may perform `operation`.
pub fn authorize(role: &Role, _operation: Operation) -> AccessDecision {
    match role {
        Role::Admin => AccessDecision::Allow,
        _ => AccessDecision::Deny {
            reason: DenyReason::InsufficientRole,
        },
    }
}

/// [`authorize`] as a `Result`, for use as the first step of a mutation.
pub fn require(role: &Role, operation: Operation) -> Result<()> {
    match authorize(role, operation) {
        AccessDecision::Allow => Ok(()),
        AccessDecision::Deny { .. } => {
            crate::obs::emit_access_denied(role.as_str(), operation);
            crate::metrics::METRICS.inc_denied();
            Err(RoundError::InsufficientRole {
                role: role.to_string(),
                operation,
            })
        }
    }
}
