//! Coverage resolution
//!
//! [`resolve_coverage`] is a pure function: no storage access, no clock, no
//! shared state. Specialty data is passed in by the caller, so effective
//! positions always reflect the specialties current at call time.
//!
//! Runs in two passes over the assignments and one over the shifts.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use super::reassignment::{split_requirement, ReassignmentRules};
use super::report::{CoverageLine, CoverageReport, PositionKey};
use crate::models::{
    Assignment, PersonId, ShiftInstance, ShiftInstanceId, Specialty, StudyType,
};

#[derive(Default, Clone, Copy)]
struct Tally {
    required: u64,
    assigned: u64,
}

/// Compute coverage for a set of shifts and the assignments on them
///
/// - Inactive assignments and soft-deleted shifts are ignored.
/// - Repeated active (person, shift, date) triples are counted once.
/// - Assignments pointing at shifts outside `shifts` are reported as orphaned.
/// - Persons missing from `specialties` still count, but never split a group.
pub fn resolve_coverage(
    shifts: &[ShiftInstance],
    assignments: &[Assignment],
    specialties: &HashMap<PersonId, Specialty>,
    rules: &ReassignmentRules,
) -> CoverageReport {
    let by_id: HashMap<ShiftInstanceId, &ShiftInstance> = shifts
        .iter()
        .filter(|s| !s.is_deleted())
        .map(|s| (s.id, s))
        .collect();

    let mut report = CoverageReport::default();

    // Pass 1: dedupe and find which (group, date) pairs are split.
    let mut seen = HashSet::with_capacity(assignments.len());
    let mut counted: Vec<(&ShiftInstance, Option<Specialty>)> =
        Vec::with_capacity(assignments.len());
    let mut split_groups: HashSet<(usize, NaiveDate)> = HashSet::new();
    let mut claimed_shifts: HashSet<ShiftInstanceId> = HashSet::new();

    for assignment in assignments.iter().filter(|a| a.is_active()) {
        let Some(shift) = by_id.get(&assignment.shift_instance_id).copied() else {
            report.orphaned_assignments += 1;
            continue;
        };
        if !seen.insert(assignment.key()) {
            report.duplicates_ignored += 1;
            continue;
        }

        let specialty = specialties.get(&assignment.person_id).copied();
        if specialty.is_none() {
            report.unknown_people += 1;
        }

        if rules.claims_body(shift.shift_type, shift.study_type, specialty) {
            if let Some(group) = rules.group_of(shift.shift_type) {
                split_groups.insert((group, shift.schedule_date));
            }
            claimed_shifts.insert(shift.id);
        }
        counted.push((shift, specialty));
    }

    let is_split = |shift: &ShiftInstance| {
        shift.study_type == StudyType::General
            && rules
                .group_of(shift.shift_type)
                .is_some_and(|g| split_groups.contains(&(g, shift.schedule_date)))
    };
    let key = |shift: &ShiftInstance, dimension: StudyType| PositionKey {
        date: shift.schedule_date,
        shift_type: shift.shift_type,
        dimension,
    };

    // Requirements
    let mut tallies: BTreeMap<PositionKey, Tally> = BTreeMap::new();
    for shift in by_id.values().copied() {
        let n = shift.desired_coverage;
        let mut require = |position: PositionKey, amount: u32| {
            let tally = tallies.entry(position).or_default();
            tally.required = tally.required.saturating_add(u64::from(amount));
        };
        if !is_split(shift) {
            require(key(shift, shift.study_type), n);
        } else if claimed_shifts.contains(&shift.id) {
            let (body, neuro) = split_requirement(n);
            require(key(shift, StudyType::Body), body);
            require(key(shift, StudyType::Neuro), neuro);
        } else {
            require(key(shift, StudyType::Neuro), n);
        }
    }

    // Pass 2: effective positions of the counted assignments
    for (shift, specialty) in counted {
        let dimension = if !is_split(shift) {
            shift.study_type
        } else if specialty == Some(Specialty::BodyOnly) {
            StudyType::Body
        } else {
            StudyType::Neuro
        };
        tallies.entry(key(shift, dimension)).or_default().assigned += 1;
    }

    let mut covered: u64 = 0;
    for (position, tally) in tallies {
        let line = CoverageLine::new(position, tally.required, tally.assigned);
        if line.is_under_staffed() {
            report.under_staffed.push(position);
        } else if line.is_over_staffed() {
            report.over_staffed.push(position);
        }
        report.total_required = report.total_required.saturating_add(tally.required);
        report.total_assigned = report.total_assigned.saturating_add(tally.assigned);
        covered = covered.saturating_add(tally.assigned.min(tally.required));
        report.lines.push(line);
    }

    report.overall_ratio = if report.total_required == 0 {
        1.0
    } else {
        covered as f64 / report.total_required as f64
    };

    report
}
