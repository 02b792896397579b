use crate::constants::actors;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authority level of the person performing an operation.
///
/// Elevated actors (office staff, administrators) may verify a release they
/// staged themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    #[default]
    Ordinary,
    Elevated,
}

/// The warehouse worker invoking a workflow operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: ActorRole::Ordinary,
        }
    }

    pub fn elevated(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: ActorRole::Elevated,
            ..Self::new(id, name)
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.role == ActorRole::Elevated
    }

    /// Snapshot of id and name, copied by value into releases and audit entries
    pub fn reference(&self) -> ActorRef {
        ActorRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// By-value copy of an actor's identity as recorded on documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: String,
    pub name: String,
}

impl ActorRef {
    /// Identity used for entries written by background maintenance
    pub fn system() -> Self {
        Self {
            id: actors::SYSTEM_ACTOR_ID.to_string(),
            name: actors::SYSTEM_ACTOR_NAME.to_string(),
        }
    }

    pub fn is(&self, actor_id: &str) -> bool {
        self.id == actor_id
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
