//! Identifier newtypes.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

string_id!(
    /// Immutable identifier of an event, shared by all of its rounds.
    EventId
);
string_id!(
    /// Globally unique round identifier, assigned by the store.
    RoundId
);
string_id!(
    /// Team identifier, owned by the team registry.
    TeamId
);
string_id!(
    /// Identifier of a single team score record.
    ScoreId
);

impl RoundId {
    /// Generate a new random RoundId
    pub fn new() -> Self {
        RoundId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreId {
    /// Generate a new random ScoreId
    pub fn new() -> Self {
        ScoreId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ScoreId {
    fn default() -> Self {
        Self::new()
    }
}
