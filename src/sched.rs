//! The exam-timetabling domain: slot construction, conflict aggregation,
//! clique preprocessing, model building, solving and result analysis,
//! orchestrated by [create_schedule].

pub mod analysis;
pub mod calendar;
pub mod clique;
pub mod conflicts;
pub mod diagnose;
pub mod model;
pub mod random;
pub mod solve;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use calendar::normalize_slot_id;
use clique::PlacementContext;
use conflicts::ConflictEdits;
use model::{ModelInputs, ScheduleTranslator};
use random::{DefaultRndGen, RandomGen, SeededRndGen};

/// One subject of the exam, as described by the subject-information input.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SubjectInfo {
    /// Exam duration in minutes; absent means the subject fits any slot.
    #[serde(rename = "시간", default)]
    pub duration: Option<u32>,
    /// Listening-test subjects cannot share a slot with each other.
    #[serde(rename = "듣기평가", default)]
    pub listening: bool,
    #[serde(rename = "자율감독", default)]
    pub self_supervised: bool,
    /// Comma-separated grade tags.
    #[serde(rename = "학년", default)]
    pub grade: String,
    #[serde(rename = "담당교사", default)]
    pub teachers: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RelationKind {
    #[serde(rename = "avoid_same_time")]
    AvoidSameTime,
    #[serde(rename = "same_time")]
    SameTime,
}

/// A pairwise requirement between two subjects: never share a slot, or
/// always share one.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SubjectRelation {
    pub subject1: String,
    pub subject2: String,
    #[serde(rename = "type")]
    pub kind: RelationKind,
}

/// Pinned placements, in the same shape the engine emits on success.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FixedAssignments {
    #[serde(default)]
    pub slot_assignments: BTreeMap<String, Vec<String>>,
}

/// The full input bundle of one scheduling run.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ScheduleInputs {
    #[serde(default)]
    pub calendar: calendar::Calendar,
    #[serde(default)]
    pub subjects: BTreeMap<String, SubjectInfo>,
    #[serde(default)]
    pub conflicts: ConflictEdits,
    #[serde(default)]
    pub relations: Vec<SubjectRelation>,
    /// teacher → slots where that teacher is unavailable
    #[serde(default)]
    pub teacher_blackouts: BTreeMap<String, BTreeSet<String>>,
    /// subject → forbidden slots
    #[serde(default)]
    pub subject_slot_bans: BTreeMap<String, BTreeSet<String>>,
    /// teacher → forbidden slots, expanded to all subjects of the teacher
    #[serde(default)]
    pub teacher_slot_bans: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub fixed_assignments: FixedAssignments,
    /// student → subjects taken
    #[serde(default)]
    pub roster: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub hard_subjects: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub max_exams_per_day: Option<u32>,
    pub max_hard_exams_per_day: Option<u32>,
    pub use_fixed_assignments: bool,
    pub random_seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            max_exams_per_day: None,
            max_hard_exams_per_day: None,
            use_fixed_assignments: true,
            random_seed: None,
        }
    }
}

/// Status callback: `(message, progress percent)`. Called at coarse
/// milestones and roughly every second while the solver runs.
pub type StatusCallback = dyn Fn(&str, u8) + Sync;

pub(crate) fn post(callback: Option<&StatusCallback>, message: &str, percent: u8) {
    if let Some(callback) = callback {
        callback(message, percent);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Success,
    Infeasible,
    NoSolution,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CliqueInfo {
    pub size: usize,
    pub subjects: Vec<String>,
    pub hints_placed: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScheduleSuccess {
    pub slot_assignments: BTreeMap<String, Vec<String>>,
    pub student_analysis: analysis::StudentAnalysis,
    pub summary: analysis::Summary,
    pub days: Vec<String>,
    pub slots: Vec<String>,
    pub solver_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clique_info: Option<CliqueInfo>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScheduleFailure {
    pub error: String,
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<diagnose::Diagnosis>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SchedulePayload {
    Success(Box<ScheduleSuccess>),
    Failure(ScheduleFailure),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleResult {
    pub status: ScheduleStatus,
    pub payload: SchedulePayload,
}

impl ScheduleResult {
    pub fn success(&self) -> Option<&ScheduleSuccess> {
        match &self.payload {
            SchedulePayload::Success(success) => Some(success),
            SchedulePayload::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ScheduleFailure> {
        match &self.payload {
            SchedulePayload::Success(_) => None,
            SchedulePayload::Failure(failure) => Some(failure),
        }
    }

    fn error(message: String) -> Self {
        ScheduleResult {
            status: ScheduleStatus::Error,
            payload: SchedulePayload::Failure(ScheduleFailure {
                error: message,
                details: Vec::new(),
                diagnosis: None,
                warnings: Vec::new(),
            }),
        }
    }
}

enum EngineRng {
    Default(DefaultRndGen),
    Seeded(SeededRndGen),
}

impl RandomGen for EngineRng {
    fn rand_in_range(&mut self, range: std::ops::Range<usize>) -> usize {
        match self {
            EngineRng::Default(rng) => rng.rand_in_range(range),
            EngineRng::Seeded(rng) => rng.rand_in_range(range),
        }
    }
}

fn normalize_ban_map(
    bans: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, BTreeSet<String>> {
    bans.iter()
        .map(|(key, slots)| {
            (
                key.clone(),
                slots.iter().map(|slot| normalize_slot_id(slot)).collect(),
            )
        })
        .collect()
}

/// Builds an exam timetable.
///
/// Pipeline: slot construction → conflict aggregation → clique hint →
/// model + objective → validation → bounded search → analysis. Structural
/// defects return [ScheduleStatus::Infeasible] before any search; a solver
/// failure returns [ScheduleStatus::NoSolution] with a diagnosis; input
/// errors and panics return [ScheduleStatus::Error]. The clique stage can
/// never abort a run: if it fails the engine just solves without hints.
pub fn create_schedule(
    config: &SchedulerConfig,
    inputs: &ScheduleInputs,
    time_limit_seconds: u64,
    callback: Option<&StatusCallback>,
) -> ScheduleResult {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        run_schedule(config, inputs, time_limit_seconds, callback)
    }));

    match outcome {
        Ok(result) => result,
        Err(panic) => ScheduleResult::error(format!(
            "Schedule creation failed unexpectedly: {}",
            panic_message(&panic)
        )),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic")
    }
}

fn run_schedule(
    config: &SchedulerConfig,
    inputs: &ScheduleInputs,
    time_limit_seconds: u64,
    callback: Option<&StatusCallback>,
) -> ScheduleResult {
    // C1: slots
    post(callback, "Building the exam slots...", 10);
    let slots = match calendar::build_slots(&inputs.calendar) {
        Ok(slots) => slots,
        Err(e) => return ScheduleResult::error(e.to_string()),
    };

    // C2: conflicts
    post(callback, "Merging the conflict data...", 20);
    let conflicts = conflicts::aggregate(&inputs.subjects, &inputs.roster, &inputs.conflicts);

    let fixed: BTreeMap<String, Vec<String>> = if config.use_fixed_assignments {
        inputs.fixed_assignments.slot_assignments.clone()
    } else {
        BTreeMap::new()
    };
    let fixed_subjects: BTreeSet<String> = fixed.values().flatten().cloned().collect();

    let subject_bans = normalize_ban_map(&inputs.subject_slot_bans);
    let teacher_bans = normalize_ban_map(&inputs.teacher_slot_bans);

    let candidate_slots = model::candidate_slots(&inputs.subjects, &slots);

    let mut warnings = Vec::new();

    // C5: clique hint (isolated; never aborts the run)
    post(callback, "Searching for the largest conflict clique...", 30);
    let mut rng = match config.random_seed {
        Some(seed) => EngineRng::Seeded(SeededRndGen::new(seed)),
        None => EngineRng::Default(DefaultRndGen::new()),
    };

    let clique_outcome = catch_unwind(AssertUnwindSafe(|| {
        let report =
            clique::find_maximum_cliques(&inputs.subjects, &conflicts, &fixed_subjects, &mut rng);
        if report.max_clique.is_empty() {
            return (report, clique::PlacementOutcome::default());
        }

        let ctx = PlacementContext {
            subjects: &inputs.subjects,
            slots: &slots,
            candidate_slots: &candidate_slots,
            blackouts: &inputs.teacher_blackouts,
            subject_bans: &subject_bans,
            teacher_bans: &teacher_bans,
            conflicts: &conflicts,
            roster: &inputs.roster,
            hard_subjects: &inputs.hard_subjects,
            max_exams_per_day: config.max_exams_per_day,
            max_hard_exams_per_day: config.max_hard_exams_per_day,
        };
        let mut current = fixed.clone();
        let clique = report.max_clique.clone();
        let placement = clique::place_clique_subjects(&clique, &ctx, &mut current, &mut rng);
        (report, placement)
    }));

    let (clique_report, placement) = match clique_outcome {
        Ok(pair) => pair,
        Err(_) => {
            warnings.push(String::from(
                "Clique preprocessing failed; continuing without hints",
            ));
            (
                clique::CliqueReport::default(),
                clique::PlacementOutcome::default(),
            )
        }
    };

    // C3: hard constraints
    post(callback, "Building the optimization model...", 40);
    let translator = ScheduleTranslator::new(ModelInputs {
        subjects: &inputs.subjects,
        slots: &slots,
        conflicts: &conflicts,
        relations: &inputs.relations,
        blackouts: &inputs.teacher_blackouts,
        subject_bans: &subject_bans,
        teacher_bans: &teacher_bans,
        fixed: &fixed,
        roster: &inputs.roster,
        hard_subjects: &inputs.hard_subjects,
        max_exams_per_day: config.max_exams_per_day,
        max_hard_exams_per_day: config.max_hard_exams_per_day,
    });

    // C4 folds into the build: the objective is part of the model.
    post(callback, "Setting up the burden objective...", 50);
    let built = match translator.build() {
        Ok(built) => built,
        Err(e) => return ScheduleResult::error(e.to_string()),
    };
    warnings.extend(built.warnings.iter().cloned());

    // C7 pre-solve: structural validation
    post(callback, "Validating the model structure...", 60);
    let issues = diagnose::validate(&built.candidate_slots, &conflicts);
    if !issues.is_empty() {
        return ScheduleResult {
            status: ScheduleStatus::Infeasible,
            payload: SchedulePayload::Failure(ScheduleFailure {
                error: String::from("The model is structurally infeasible"),
                details: issues.iter().map(|issue| issue.to_string()).collect(),
                diagnosis: Some(diagnose::diagnose(&built.candidate_slots, &conflicts)),
                warnings,
            }),
        };
    }

    // C5 hints only exist when something was placed.
    let hints = if placement.placed.is_empty() {
        BTreeMap::new()
    } else {
        clique::hints_from_placement(&placement.placed, &built.candidate_slots)
    };

    // C6: bounded search
    let status = solve::solve_with_progress(
        &built.problem,
        &hints,
        Duration::from_secs(time_limit_seconds),
        callback,
    );
    post(callback, "The search finished; collecting the result...", 80);

    let status_name = status.name().to_owned();
    let solution = match status.solution() {
        Some(solution) => solution,
        None => {
            post(callback, "Diagnosing the failed search...", 85);
            return ScheduleResult {
                status: ScheduleStatus::NoSolution,
                payload: SchedulePayload::Failure(ScheduleFailure {
                    error: String::from("No exam timetable could be generated"),
                    details: Vec::new(),
                    diagnosis: Some(diagnose::diagnose(&built.candidate_slots, &conflicts)),
                    warnings,
                }),
            };
        }
    };

    // C8: extraction and analysis
    post(callback, "Extracting the assignment...", 85);
    let slot_assignments = solve::extract_assignments(&solution, &slots, &built.candidate_slots);

    post(callback, "Analyzing the student load...", 90);
    let student_analysis = analysis::analyze(
        &slot_assignments,
        &inputs.roster,
        &inputs.hard_subjects,
        &slots,
    );
    let summary = analysis::summarize(
        &student_analysis,
        inputs.subjects.len(),
        slots.len(),
        config.max_exams_per_day,
        config.max_hard_exams_per_day,
    );

    let clique_info = (!clique_report.max_clique.is_empty()).then(|| CliqueInfo {
        size: clique_report.max_clique.len(),
        subjects: clique_report.max_clique.clone(),
        hints_placed: placement.placed.len(),
    });

    post(callback, "The timetable is ready.", 100);

    ScheduleResult {
        status: ScheduleStatus::Success,
        payload: SchedulePayload::Success(Box::new(ScheduleSuccess {
            slot_assignments,
            student_analysis,
            summary,
            days: slots.day_keys(),
            slots: slots.ids().map(str::to_owned).collect(),
            solver_status: status_name,
            clique_info,
            warnings,
        })),
    }
}
