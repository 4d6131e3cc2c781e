
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::conflicts::ConflictMaps;

/// A structural defect found before the solver runs. Either one makes the
/// model infeasible no matter how long the search would look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralIssue {
    SubjectHasNoSlot(String),
    PairHasNoCommonSlot(String, String),
}

impl std::fmt::Display for StructuralIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructuralIssue::SubjectHasNoSlot(subject) => {
                write!(f, "Subject '{}' has no slot it can be assigned to", subject)
            }
            StructuralIssue::PairHasNoCommonSlot(a, b) => write!(
                f,
                "Conflicting subjects '{}' and '{}' share no common slot",
                a, b
            ),
        }
    }
}

/// Pre-solve structural validation.
///
/// Checks that every subject kept at least one candidate slot and that
/// every conflicting pair shares at least one slot. Fewer slots than
/// subjects is deliberately not flagged: slots hold multiple subjects.
pub fn validate(
    candidate_slots: &BTreeMap<String, Vec<String>>,
    conflicts: &ConflictMaps,
) -> Vec<StructuralIssue> {
    let mut issues = Vec::new();

    for (subject, candidates) in candidate_slots {
        if candidates.is_empty() {
            issues.push(StructuralIssue::SubjectHasNoSlot(subject.clone()));
        }
    }

    for (a, b) in conflicts.union_pairs() {
        let (Some(slots_a), Some(slots_b)) = (candidate_slots.get(&a), candidate_slots.get(&b))
        else {
            continue;
        };
        let set_a: BTreeSet<&String> = slots_a.iter().collect();
        if !slots_b.iter().any(|slot| set_a.contains(slot)) {
            issues.push(StructuralIssue::PairHasNoCommonSlot(a, b));
        }
    }

    issues
}

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct ConstraintInfo {
    pub total_slots: usize,
    pub total_subjects: usize,
    pub subjects_with_few_slots: Vec<String>,
    pub high_conflict_subjects: Vec<String>,
}

/// Post-mortem produced when the solver finds no solution.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct Diagnosis {
    pub possible_causes: Vec<String>,
    pub recommendations: Vec<String>,
    pub constraint_info: ConstraintInfo,
}

/// Points at the likeliest causes: subjects squeezed down to one candidate
/// slot, and subjects conflicting with more than half the slot count.
pub fn diagnose(
    candidate_slots: &BTreeMap<String, Vec<String>>,
    conflicts: &ConflictMaps,
) -> Diagnosis {
    let mut diagnosis = Diagnosis::default();

    let used_slots: BTreeSet<&String> = candidate_slots.values().flatten().collect();
    let total_slots = used_slots.len();
    let total_subjects = candidate_slots.len();

    let subjects_with_few_slots: Vec<String> = candidate_slots
        .iter()
        .filter(|(_, candidates)| candidates.len() <= 1)
        .map(|(subject, _)| subject.clone())
        .collect();

    if !subjects_with_few_slots.is_empty() {
        diagnosis
            .possible_causes
            .push(String::from("Some subjects have almost no slot they can be assigned to"));
        diagnosis.recommendations.push(String::from(
            "Relax the duration or teacher restrictions of the listed subjects",
        ));
        diagnosis.constraint_info.subjects_with_few_slots = subjects_with_few_slots;
    }

    let union = conflicts.union();
    let high_conflict_subjects: Vec<String> = union
        .iter()
        .filter(|(_, others)| others.len() > total_slots / 2)
        .map(|(subject, _)| subject.clone())
        .collect();

    if !high_conflict_subjects.is_empty() {
        diagnosis
            .possible_causes
            .push(String::from("Some subjects conflict with too many others"));
        diagnosis.recommendations.push(String::from(
            "Review the conflict data and drop the pairs that are not really needed",
        ));
        diagnosis.constraint_info.high_conflict_subjects = high_conflict_subjects;
    }

    if diagnosis.recommendations.is_empty() {
        diagnosis.recommendations.extend([
            String::from("Raise the solver time budget"),
            String::from("Add exam days or periods"),
            String::from("Reduce the conflicts between subjects"),
            String::from("Reduce the teacher unavailability entries"),
        ]);
    }

    diagnosis.constraint_info.total_slots = total_slots;
    diagnosis.constraint_info.total_subjects = total_subjects;

    diagnosis
}
