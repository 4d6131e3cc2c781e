use super::*;
use crate::sched::calendar::{build_slots, Calendar, PeriodSpec};

struct Fixture {
    subjects: BTreeMap<String, SubjectInfo>,
    slots: SlotTable,
    conflicts: ConflictMaps,
    relations: Vec<SubjectRelation>,
    blackouts: BTreeMap<String, BTreeSet<String>>,
    subject_bans: BTreeMap<String, BTreeSet<String>>,
    teacher_bans: BTreeMap<String, BTreeSet<String>>,
    fixed: BTreeMap<String, Vec<String>>,
    roster: BTreeMap<String, BTreeSet<String>>,
    hard_subjects: BTreeMap<String, bool>,
    max_exams_per_day: Option<u32>,
    max_hard_exams_per_day: Option<u32>,
}

fn slot_table() -> SlotTable {
    // Two days, two periods each; 50 then 80 minutes per day.
    let calendar = Calendar {
        exam_dates: BTreeMap::from([
            (String::from("제1일"), String::from("d1")),
            (String::from("제2일"), String::from("d2")),
        ]),
        date_periods: BTreeMap::from([
            (
                1,
                BTreeMap::from([
                    (1, PeriodSpec::with_duration(50)),
                    (2, PeriodSpec::with_duration(80)),
                ]),
            ),
            (
                2,
                BTreeMap::from([
                    (1, PeriodSpec::with_duration(50)),
                    (2, PeriodSpec::with_duration(80)),
                ]),
            ),
        ]),
        ..Calendar::default()
    };
    build_slots(&calendar).unwrap()
}

fn subject(duration: Option<u32>, teachers: &[&str]) -> SubjectInfo {
    SubjectInfo {
        duration,
        listening: false,
        self_supervised: false,
        grade: String::new(),
        teachers: teachers.iter().map(|t| (*t).to_owned()).collect(),
    }
}

impl Fixture {
    fn new() -> Self {
        Fixture {
            subjects: BTreeMap::from([
                (String::from("국어"), subject(Some(80), &["김"])),
                (String::from("수학"), subject(Some(50), &["이"])),
                (String::from("영어"), subject(None, &["박"])),
            ]),
            slots: slot_table(),
            conflicts: ConflictMaps::default(),
            relations: Vec::new(),
            blackouts: BTreeMap::new(),
            subject_bans: BTreeMap::new(),
            teacher_bans: BTreeMap::new(),
            fixed: BTreeMap::new(),
            roster: BTreeMap::new(),
            hard_subjects: BTreeMap::new(),
            max_exams_per_day: None,
            max_hard_exams_per_day: None,
        }
    }

    fn translator(&self) -> ScheduleTranslator<'_> {
        ScheduleTranslator::new(ModelInputs {
            subjects: &self.subjects,
            slots: &self.slots,
            conflicts: &self.conflicts,
            relations: &self.relations,
            blackouts: &self.blackouts,
            subject_bans: &self.subject_bans,
            teacher_bans: &self.teacher_bans,
            fixed: &self.fixed,
            roster: &self.roster,
            hard_subjects: &self.hard_subjects,
            max_exams_per_day: self.max_exams_per_day,
            max_hard_exams_per_day: self.max_hard_exams_per_day,
        })
    }
}

#[test]
fn duration_prefilter_drops_short_slots() {
    let fixture = Fixture::new();
    let candidates = candidate_slots(&fixture.subjects, &fixture.slots);

    // 80-minute subject only fits the 80-minute periods.
    assert_eq!(
        candidates[&String::from("국어")],
        vec![String::from("제1일2교시"), String::from("제2일2교시")]
    );
    // Subjects without a duration fit everywhere.
    assert_eq!(candidates[&String::from("영어")].len(), 4);
}

#[test]
fn each_subject_gets_two_unique_constraints() {
    let fixture = Fixture::new();
    let translator = fixture.translator();

    let constraints = translator.build_unique_assignment_constraints();
    assert_eq!(constraints.len(), 2 * fixture.subjects.len());
}

#[test]
fn pair_constraints_are_emitted_once_per_common_slot() {
    let mut fixture = Fixture::new();
    // Symmetric adjacency, as the aggregator produces it.
    fixture.conflicts.student = BTreeMap::from([
        (
            String::from("수학"),
            BTreeSet::from([String::from("영어")]),
        ),
        (
            String::from("영어"),
            BTreeSet::from([String::from("수학")]),
        ),
    ]);
    let translator = fixture.translator();

    let constraints = translator.build_pairwise_conflict_constraints(&fixture.conflicts.student);
    // 수학 fits all four slots, 영어 fits all four: one constraint per slot.
    assert_eq!(constraints.len(), 4);
}

#[test]
fn duration_guards_are_noops_after_prefiltering() {
    let fixture = Fixture::new();
    let translator = fixture.translator();
    assert!(translator.build_duration_guard_constraints().is_empty());
}

#[test]
fn blackout_pins_variables_to_zero() {
    let mut fixture = Fixture::new();
    fixture.blackouts.insert(
        String::from("김"),
        BTreeSet::from([String::from("제1일2교시")]),
    );
    let translator = fixture.translator();

    let constraints = translator.build_teacher_blackout_constraints();
    assert_eq!(constraints.len(), 1);
    let pinned = &constraints[0];
    assert_eq!(
        pinned.get_var(&Variable::Assign {
            subject: String::from("국어"),
            slot: String::from("제1일2교시"),
        }),
        Some(1)
    );
}

#[test]
fn teacher_ban_expands_to_taught_subjects() {
    let mut fixture = Fixture::new();
    fixture.teacher_bans.insert(
        String::from("이"),
        BTreeSet::from([String::from("제1일1교시"), String::from("제2일1교시")]),
    );
    let translator = fixture.translator();

    let constraints = translator.build_slot_ban_constraints();
    // 수학 is the only subject taught by 이.
    assert_eq!(constraints.len(), 2);
}

#[test]
fn missing_fixed_assignment_variable_warns_and_skips() {
    let mut fixture = Fixture::new();
    // 국어 (80 min) cannot sit in a 50-minute period.
    fixture.fixed.insert(
        String::from("제1일1교시"),
        vec![String::from("국어")],
    );
    let translator = fixture.translator();

    let mut warnings = Vec::new();
    let constraints = translator.build_fixed_assignment_constraints(&mut warnings);
    assert!(constraints.is_empty());
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("국어"));
}

#[test]
fn fixed_assignment_pins_and_excludes() {
    let mut fixture = Fixture::new();
    fixture.fixed.insert(
        String::from("제1일2교시"),
        vec![String::from("국어")],
    );
    let translator = fixture.translator();

    let mut warnings = Vec::new();
    let constraints = translator.build_fixed_assignment_constraints(&mut warnings);
    assert!(warnings.is_empty());
    // One pin plus one exclusion for the other candidate slot.
    assert_eq!(constraints.len(), 2);
}

#[test]
fn objective_variables_follow_the_caps() {
    let mut fixture = Fixture::new();
    fixture.roster.insert(
        String::from("학생1"),
        BTreeSet::from([String::from("국어"), String::from("수학")]),
    );
    fixture.max_exams_per_day = Some(2);
    let translator = fixture.translator();

    let built = translator.build().unwrap();
    let variables = built.problem.get_variables();

    assert!(variables.contains_key(&Variable::MaxLoad {
        student: String::from("학생1")
    }));
    assert!(variables.contains_key(&Variable::AtCap {
        student: String::from("학생1")
    }));
    // Hard-exam cap is absent, so no hard-side aggregates exist.
    assert!(!variables.contains_key(&Variable::MaxHardLoad {
        student: String::from("학생1")
    }));
    assert!(built.problem.has_objective());
}

#[test]
fn no_caps_means_no_objective() {
    let mut fixture = Fixture::new();
    fixture.roster.insert(
        String::from("학생1"),
        BTreeSet::from([String::from("국어")]),
    );
    let translator = fixture.translator();

    let built = translator.build().unwrap();
    assert!(!built.problem.has_objective());
}

#[test]
fn unknown_subjects_are_reported_once() {
    let mut fixture = Fixture::new();
    fixture.roster.insert(
        String::from("학생1"),
        BTreeSet::from([String::from("없는과목")]),
    );
    fixture.conflicts.student = BTreeMap::from([
        (
            String::from("없는과목"),
            BTreeSet::from([String::from("국어")]),
        ),
        (
            String::from("국어"),
            BTreeSet::from([String::from("없는과목")]),
        ),
    ]);
    let translator = fixture.translator();

    let built = translator.build().unwrap();
    let about_unknown: Vec<&String> = built
        .warnings
        .iter()
        .filter(|w| w.contains("없는과목"))
        .collect();
    assert_eq!(about_unknown.len(), 1);
}

#[test]
fn relations_with_unknown_subjects_warn() {
    let mut fixture = Fixture::new();
    fixture.relations.push(SubjectRelation {
        subject1: String::from("국어"),
        subject2: String::from("없는과목"),
        kind: RelationKind::SameTime,
    });
    let translator = fixture.translator();

    let mut warnings = Vec::new();
    let constraints = translator.build_relation_constraints(&mut warnings);
    assert!(constraints.is_empty());
    assert_eq!(warnings.len(), 1);
}
