//! Audit and soft-delete fields shared by every entity
//!
//! Entities embed a [`Lifecycle`] instead of repeating the same six fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::UserId;

/// Creation, update and soft-delete metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_at: DateTime<Utc>,
    pub updated_by: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<UserId>,
}

impl Lifecycle {
    /// Start a lifecycle owned by `actor`
    pub fn new(actor: UserId) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            created_by: actor,
            updated_at: now,
            updated_by: actor,
            deleted_at: None,
            deleted_by: None,
        }
    }

    /// Record a modification
    pub fn touch(&mut self, actor: UserId) {
        self.updated_at = Utc::now();
        self.updated_by = actor;
    }

    /// Mark as deleted. The first deletion wins.
    pub fn soft_delete(&mut self, actor: UserId) {
        if self.deleted_at.is_some() {
            return;
        }
        self.deleted_at = Some(Utc::now());
        self.deleted_by = Some(actor);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
