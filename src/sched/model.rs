#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::ilp::linexpr::{Constraint, Expr};
use crate::ilp::{self, ObjectiveSense, Problem, ProblemBuilder};

use super::calendar::SlotTable;
use super::conflicts::{AdjacencyMap, ConflictMaps};
use super::{RelationKind, SubjectInfo, SubjectRelation};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("The assembled model is inconsistent: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Decision and auxiliary variables of the timetabling model.
///
/// `Assign` is 1 when the subject sits in the slot. `MaxLoad` /
/// `MaxHardLoad` aggregate a student's worst day, and `AtCap` / `AtHardCap`
/// indicate that the aggregate reached the configured cap.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Variable {
    Assign { subject: String, slot: String },
    MaxLoad { student: String },
    MaxHardLoad { student: String },
    AtCap { student: String },
    AtHardCap { student: String },
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variable::Assign { subject, slot } => write!(f, "SiS_{}_{}", subject, slot),
            Variable::MaxLoad { student } => write!(f, "MxE_{}", student),
            Variable::MaxHardLoad { student } => write!(f, "MxH_{}", student),
            Variable::AtCap { student } => write!(f, "AtC_{}", student),
            Variable::AtHardCap { student } => write!(f, "AtH_{}", student),
        }
    }
}

fn assign(subject: &str, slot: &str) -> Expr<Variable> {
    Expr::var(Variable::Assign {
        subject: subject.to_owned(),
        slot: slot.to_owned(),
    })
}

/// Slots each subject can sit in at all: the duration prefilter. A subject
/// without a duration fits any slot.
pub fn candidate_slots(
    subjects: &BTreeMap<String, SubjectInfo>,
    slots: &SlotTable,
) -> BTreeMap<String, Vec<String>> {
    subjects
        .iter()
        .map(|(name, info)| {
            let candidates = slots
                .slots()
                .iter()
                .filter(|slot| info.duration.map_or(true, |d| d <= slot.limit_minutes))
                .map(|slot| slot.id.clone())
                .collect();
            (name.clone(), candidates)
        })
        .collect()
}

/// Borrowed inputs of the model builder. Ban maps carry normalized slot
/// ids (underscores stripped).
pub struct ModelInputs<'a> {
    pub subjects: &'a BTreeMap<String, SubjectInfo>,
    pub slots: &'a SlotTable,
    pub conflicts: &'a ConflictMaps,
    pub relations: &'a [SubjectRelation],
    pub blackouts: &'a BTreeMap<String, BTreeSet<String>>,
    pub subject_bans: &'a BTreeMap<String, BTreeSet<String>>,
    pub teacher_bans: &'a BTreeMap<String, BTreeSet<String>>,
    pub fixed: &'a BTreeMap<String, Vec<String>>,
    pub roster: &'a BTreeMap<String, BTreeSet<String>>,
    pub hard_subjects: &'a BTreeMap<String, bool>,
    pub max_exams_per_day: Option<u32>,
    pub max_hard_exams_per_day: Option<u32>,
}

/// The frozen model plus everything downstream stages need alongside it.
#[derive(Debug)]
pub struct BuiltModel {
    pub problem: Problem<Variable>,
    pub candidate_slots: BTreeMap<String, Vec<String>>,
    pub warnings: Vec<String>,
}

/// Translates the validated scheduling inputs into an ILP.
pub struct ScheduleTranslator<'a> {
    inputs: ModelInputs<'a>,
    candidate_lists: BTreeMap<String, Vec<String>>,
    candidate_sets: BTreeMap<String, BTreeSet<String>>,
}

impl<'a> ScheduleTranslator<'a> {
    pub fn new(inputs: ModelInputs<'a>) -> Self {
        let candidate_lists = candidate_slots(inputs.subjects, inputs.slots);
        let candidate_sets = candidate_lists
            .iter()
            .map(|(name, list)| (name.clone(), list.iter().cloned().collect()))
            .collect();
        ScheduleTranslator {
            inputs,
            candidate_lists,
            candidate_sets,
        }
    }

    fn has_var(&self, subject: &str, slot: &str) -> bool {
        self.candidate_sets
            .get(subject)
            .map_or(false, |set| set.contains(slot))
    }

    fn build_assignment_variables(&self) -> Vec<(Variable, ilp::Variable)> {
        self.candidate_lists
            .iter()
            .flat_map(|(subject, slots)| {
                slots.iter().map(move |slot| {
                    (
                        Variable::Assign {
                            subject: subject.clone(),
                            slot: slot.clone(),
                        },
                        ilp::Variable::binary(),
                    )
                })
            })
            .collect()
    }

    /// Each subject sits in exactly one slot, split into `>= 1` and `<= 1`
    /// so an infeasibility points at the side that failed.
    fn build_unique_assignment_constraints(&self) -> Vec<Constraint<Variable>> {
        let mut constraints = Vec::new();
        for (subject, slots) in &self.candidate_lists {
            let mut sum = Expr::constant(0);
            for slot in slots {
                sum = sum + assign(subject, slot);
            }
            constraints.push(sum.geq(&Expr::constant(1)));
            constraints.push(sum.leq(&Expr::constant(1)));
        }
        constraints
    }

    /// Pairwise exclusion over one conflict flavor: conflicting subjects
    /// may not share any slot. Each unordered pair is emitted once.
    fn build_pairwise_conflict_constraints(&self, map: &AdjacencyMap) -> Vec<Constraint<Variable>> {
        let mut constraints = Vec::new();
        for (a, others) in map {
            for b in others {
                if a >= b {
                    continue;
                }
                constraints.extend(self.pair_exclusions(a, b));
            }
        }
        constraints
    }

    fn pair_exclusions(&self, a: &str, b: &str) -> Vec<Constraint<Variable>> {
        let mut constraints = Vec::new();
        for slot in self.inputs.slots.slots() {
            if self.has_var(a, &slot.id) && self.has_var(b, &slot.id) {
                constraints.push((assign(a, &slot.id) + assign(b, &slot.id)).leq(&Expr::constant(1)));
            }
        }
        constraints
    }

    /// Defense-in-depth behind the variable prefilter: pin any variable
    /// whose subject could not actually fit its slot.
    fn build_duration_guard_constraints(&self) -> Vec<Constraint<Variable>> {
        let mut constraints = Vec::new();
        for (subject, info) in self.inputs.subjects {
            let Some(duration) = info.duration else {
                continue;
            };
            for slot in self.inputs.slots.slots() {
                if self.has_var(subject, &slot.id) && duration > slot.limit_minutes {
                    constraints.push(assign(subject, &slot.id).eq(&Expr::constant(0)));
                }
            }
        }
        constraints
    }

    fn build_teacher_blackout_constraints(&self) -> Vec<Constraint<Variable>> {
        let mut constraints = Vec::new();
        for (subject, info) in self.inputs.subjects {
            for teacher in &info.teachers {
                let Some(blocked) = self.inputs.blackouts.get(teacher) else {
                    continue;
                };
                for slot in blocked {
                    if self.has_var(subject, slot) {
                        constraints.push(assign(subject, slot).eq(&Expr::constant(0)));
                    }
                }
            }
        }
        constraints
    }

    fn build_slot_ban_constraints(&self) -> Vec<Constraint<Variable>> {
        let mut constraints = Vec::new();

        for (subject, banned) in self.inputs.subject_bans {
            for slot in banned {
                if self.has_var(subject, slot) {
                    constraints.push(assign(subject, slot).eq(&Expr::constant(0)));
                }
            }
        }

        // Teacher-level bans expand to every subject that teacher teaches.
        for (teacher, banned) in self.inputs.teacher_bans {
            for (subject, info) in self.inputs.subjects {
                if !info.teachers.contains(teacher) {
                    continue;
                }
                for slot in banned {
                    if self.has_var(subject, slot) {
                        constraints.push(assign(subject, slot).eq(&Expr::constant(0)));
                    }
                }
            }
        }

        constraints
    }

    fn build_relation_constraints(
        &self,
        warnings: &mut Vec<String>,
    ) -> Vec<Constraint<Variable>> {
        let mut constraints = Vec::new();
        for relation in self.inputs.relations {
            let (a, b) = (&relation.subject1, &relation.subject2);
            if !self.candidate_sets.contains_key(a) || !self.candidate_sets.contains_key(b) {
                warnings.push(format!(
                    "Pairwise relation between '{}' and '{}' references an unknown subject and was skipped",
                    a, b
                ));
                continue;
            }
            match relation.kind {
                RelationKind::AvoidSameTime => {
                    constraints.extend(self.pair_exclusions(a, b));
                }
                RelationKind::SameTime => {
                    for slot in self.inputs.slots.slots() {
                        if self.has_var(a, &slot.id) && self.has_var(b, &slot.id) {
                            constraints.push(assign(a, &slot.id).eq(&assign(b, &slot.id)));
                        }
                    }
                }
            }
        }
        constraints
    }

    /// Pins from the fixed-assignment input. A pin whose variable does not
    /// exist is reported as a warning and skipped, never an error.
    fn build_fixed_assignment_constraints(
        &self,
        warnings: &mut Vec<String>,
    ) -> Vec<Constraint<Variable>> {
        let mut constraints = Vec::new();
        for (slot_id, subjects) in self.inputs.fixed {
            for subject in subjects {
                if !self.has_var(subject, slot_id) {
                    warnings.push(format!(
                        "Cannot pin '{}' to '{}': no assignment variable exists there",
                        subject, slot_id
                    ));
                    continue;
                }
                constraints.push(assign(subject, slot_id).eq(&Expr::constant(1)));
                for other in &self.candidate_lists[subject] {
                    if other != slot_id {
                        constraints.push(assign(subject, other).eq(&Expr::constant(0)));
                    }
                }
            }
        }
        constraints
    }

    /// A student's subjects placed on one day, as a linear expression.
    /// Returns None when no variable contributes.
    fn day_load_expr(&self, taken: &BTreeSet<String>, day: &str, hard_only: bool) -> Option<Expr<Variable>> {
        let mut expr = Expr::constant(0);
        let mut any = false;
        for subject in taken {
            if hard_only
                && !self
                    .inputs
                    .hard_subjects
                    .get(subject)
                    .copied()
                    .unwrap_or(false)
            {
                continue;
            }
            for slot in self.inputs.slots.slots_of_day(day) {
                if self.has_var(subject, &slot.id) {
                    expr = expr + assign(subject, &slot.id);
                    any = true;
                }
            }
        }
        any.then_some(expr)
    }

    fn build_daily_cap_constraints(&self) -> Vec<Constraint<Variable>> {
        let mut constraints = Vec::new();
        let days = self.inputs.slots.day_keys();

        for taken in self.inputs.roster.values() {
            for day in &days {
                if let Some(cap) = self.inputs.max_exams_per_day {
                    if let Some(expr) = self.day_load_expr(taken, day, false) {
                        let cap = cap.try_into().expect("Should be less than 2^31 maximum");
                        constraints.push(expr.leq(&Expr::constant(cap)));
                    }
                }
                if let Some(cap) = self.inputs.max_hard_exams_per_day {
                    if let Some(expr) = self.day_load_expr(taken, day, true) {
                        let cap = cap.try_into().expect("Should be less than 2^31 maximum");
                        constraints.push(expr.leq(&Expr::constant(cap)));
                    }
                }
            }
        }

        constraints
    }

    /// Worst-day aggregation and cap indicators for one flavor of load.
    ///
    /// `max_load >= load(day)` for every day, and the indicator is guarded
    /// from both sides: `cap·ind <= max_load` and
    /// `max_load <= cap - 1 + ind`. Under minimization the indicator is
    /// exactly "some day hits the cap".
    fn build_objective_terms(
        &self,
        student: &str,
        taken: &BTreeSet<String>,
        cap: u32,
        hard_only: bool,
        variables: &mut Vec<(Variable, ilp::Variable)>,
        constraints: &mut Vec<Constraint<Variable>>,
    ) -> Expr<Variable> {
        let cap: i32 = cap.try_into().expect("Should be less than 2^31 maximum");

        let max_load = if hard_only {
            Variable::MaxHardLoad {
                student: student.to_owned(),
            }
        } else {
            Variable::MaxLoad {
                student: student.to_owned(),
            }
        };
        let at_cap = if hard_only {
            Variable::AtHardCap {
                student: student.to_owned(),
            }
        } else {
            Variable::AtCap {
                student: student.to_owned(),
            }
        };

        variables.push((max_load.clone(), ilp::Variable::integer().min(0).max(cap)));
        variables.push((at_cap.clone(), ilp::Variable::binary()));

        let max_load = Expr::var(max_load);
        let at_cap = Expr::var(at_cap);

        for day in self.inputs.slots.day_keys() {
            if let Some(load) = self.day_load_expr(taken, &day, hard_only) {
                constraints.push((load - &max_load).leq(&Expr::constant(0)));
            }
        }

        constraints.push((cap * &at_cap - &max_load).leq(&Expr::constant(0)));
        constraints.push((&max_load - (cap - 1) - &at_cap).leq(&Expr::constant(0)));

        at_cap
    }

    /// Assembles the full problem: variables, hard constraints and the
    /// burden objective (minimize the number of students at a cap).
    pub fn build(&self) -> Result<BuiltModel> {
        let mut warnings = self.collect_unknown_subject_warnings();

        let mut builder = ProblemBuilder::new()
            .set_variables(self.build_assignment_variables())
            .add_constraints(self.build_unique_assignment_constraints())
            .add_constraints(self.build_pairwise_conflict_constraints(&self.inputs.conflicts.student))
            .add_constraints(
                self.build_pairwise_conflict_constraints(&self.inputs.conflicts.listening),
            )
            .add_constraints(self.build_pairwise_conflict_constraints(&self.inputs.conflicts.teacher))
            .add_constraints(self.build_duration_guard_constraints())
            .add_constraints(self.build_teacher_blackout_constraints())
            .add_constraints(self.build_slot_ban_constraints())
            .add_constraints(self.build_relation_constraints(&mut warnings))
            .add_constraints(self.build_fixed_assignment_constraints(&mut warnings))
            .add_constraints(self.build_daily_cap_constraints());

        let mut objective = Expr::constant(0);
        let mut aux_variables = Vec::new();
        let mut aux_constraints = Vec::new();

        for (student, taken) in self.inputs.roster {
            if let Some(cap) = self.inputs.max_exams_per_day {
                objective = objective
                    + self.build_objective_terms(
                        student,
                        taken,
                        cap,
                        false,
                        &mut aux_variables,
                        &mut aux_constraints,
                    );
            }
            if let Some(cap) = self.inputs.max_hard_exams_per_day {
                objective = objective
                    + self.build_objective_terms(
                        student,
                        taken,
                        cap,
                        true,
                        &mut aux_variables,
                        &mut aux_constraints,
                    );
            }
        }

        builder = builder
            .set_variables(aux_variables)
            .add_constraints(aux_constraints);
        if !objective.is_empty() {
            builder = builder.set_objective(objective, ObjectiveSense::Minimize);
        }

        let problem = builder.build().map_err(|e| Error::Model(e.to_string()))?;

        Ok(BuiltModel {
            problem,
            candidate_slots: self.candidate_lists.clone(),
            warnings,
        })
    }

    /// Subjects referenced by conflicts, relations, pins or the roster but
    /// absent from the catalogue are skipped with a warning.
    fn collect_unknown_subject_warnings(&self) -> Vec<String> {
        let mut unknown = BTreeSet::new();

        let known = |s: &String| self.inputs.subjects.contains_key(s);

        for map in [
            &self.inputs.conflicts.student,
            &self.inputs.conflicts.listening,
            &self.inputs.conflicts.teacher,
        ] {
            for (subject, others) in map.iter() {
                if !known(subject) {
                    unknown.insert(subject.clone());
                }
                for other in others {
                    if !known(other) {
                        unknown.insert(other.clone());
                    }
                }
            }
        }

        for taken in self.inputs.roster.values() {
            for subject in taken {
                if !known(subject) {
                    unknown.insert(subject.clone());
                }
            }
        }

        for subjects in self.inputs.fixed.values() {
            for subject in subjects {
                if !known(subject) {
                    unknown.insert(subject.clone());
                }
            }
        }

        for subject in self.inputs.subject_bans.keys() {
            if !known(subject) {
                unknown.insert(subject.clone());
            }
        }

        unknown
            .into_iter()
            .map(|s| format!("Unknown subject '{}' referenced by the inputs was skipped", s))
            .collect()
    }
}
