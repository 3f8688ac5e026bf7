use serde::{Deserialize, Serialize};

use super::ids::{PersonId, UserId};
use super::lifecycle::Lifecycle;
use super::shift::Specialty;

/// A radiologist who can be assigned to shifts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub specialty: Specialty,
    pub active: bool,
    /// Alternate spellings used by the external schedules
    #[serde(default)]
    pub aliases: Vec<String>,
    pub lifecycle: Lifecycle,
}

impl Person {
    pub fn new(name: impl Into<String>, specialty: Specialty, actor: UserId) -> Self {
        Self {
            id: PersonId::new(),
            name: name.into(),
            specialty,
            active: true,
            aliases: Vec::new(),
            lifecycle: Lifecycle::new(actor),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Case-insensitive match against the display name and every alias
    pub fn matches_name(&self, name: &str) -> bool {
        let needle = name.trim();
        if needle.is_empty() {
            return false;
        }
        std::iter::once(self.name.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .any(|candidate| candidate.trim().eq_ignore_ascii_case(needle))
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle.is_deleted()
    }
}
