//! Specialty-driven reassignment rules
//!
//! When a `BODY_ONLY` radiologist sits on a GENERAL shift of a reassignment
//! group, the group is split for that date: the body-only person covers the
//! body workload and everyone else on the group's GENERAL shifts covers the
//! neuro workload. Which shift types form a group is configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{ShiftType, Specialty, StudyType};

/// Shift types that share workload and are split together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentGroup {
    pub name: String,
    pub shift_types: Vec<ShiftType>,
}

impl ReassignmentGroup {
    pub fn new(name: impl Into<String>, shift_types: impl IntoIterator<Item = ShiftType>) -> Self {
        Self {
            name: name.into(),
            shift_types: shift_types.into_iter().collect(),
        }
    }

    /// ON1 + ON2
    pub fn overnight() -> Self {
        Self::new("overnight", [ShiftType::On1, ShiftType::On2])
    }

    /// MidC + MidL
    pub fn midday() -> Self {
        Self::new("midday", [ShiftType::MidC, ShiftType::MidL])
    }
}

/// Set of reassignment groups; a shift type belongs to at most one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassignmentRules {
    groups: Vec<ReassignmentGroup>,
    index: HashMap<ShiftType, usize>,
}

impl ReassignmentRules {
    /// Build rules from groups. A shift type listed in several groups stays
    /// in the first one.
    pub fn new(groups: Vec<ReassignmentGroup>) -> Self {
        let mut index = HashMap::new();
        for (i, group) in groups.iter().enumerate() {
            for shift_type in &group.shift_types {
                index.entry(*shift_type).or_insert(i);
            }
        }
        Self { groups, index }
    }

    /// No reassignment at all
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_group(mut self, group: ReassignmentGroup) -> Self {
        self.groups.push(group);
        Self::new(self.groups)
    }

    pub fn groups(&self) -> &[ReassignmentGroup] {
        &self.groups
    }

    /// Index of the group containing `shift_type`
    pub fn group_of(&self, shift_type: ShiftType) -> Option<usize> {
        self.index.get(&shift_type).copied()
    }

    /// Whether an assignment of `specialty` to a shift of this type and study
    /// splits the shift's group
    pub fn claims_body(
        &self,
        shift_type: ShiftType,
        study_type: StudyType,
        specialty: Option<Specialty>,
    ) -> bool {
        study_type == StudyType::General
            && specialty == Some(Specialty::BodyOnly)
            && self.group_of(shift_type).is_some()
    }
}

impl Default for ReassignmentRules {
    fn default() -> Self {
        Self::new(vec![ReassignmentGroup::overnight()])
    }
}

/// Split of a GENERAL requirement `n` when a body-only claimant is present:
/// `(body, neuro)`
pub fn split_requirement(desired: u32) -> (u32, u32) {
    if desired == 0 {
        return (0, 0);
    }
    let neuro = desired / 2;
    ((desired - neuro).max(1), neuro.max(1))
}
