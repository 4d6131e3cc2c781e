use super::calendar::{Calendar, PeriodSpec};
use super::*;

fn minimal_inputs() -> ScheduleInputs {
    ScheduleInputs {
        calendar: Calendar {
            exam_dates: BTreeMap::from([(String::from("제1일"), String::from("d1"))]),
            date_periods: BTreeMap::from([(
                1,
                BTreeMap::from([
                    (1, PeriodSpec::with_duration(50)),
                    (2, PeriodSpec::with_duration(50)),
                ]),
            )]),
            ..Calendar::default()
        },
        subjects: BTreeMap::from([(
            String::from("국어"),
            SubjectInfo {
                duration: Some(50),
                ..SubjectInfo::default()
            },
        )]),
        ..ScheduleInputs::default()
    }
}

#[test]
fn empty_calendar_is_an_input_error() {
    let inputs = ScheduleInputs::default();
    let result = create_schedule(&SchedulerConfig::default(), &inputs, 5, None);

    assert_eq!(result.status, ScheduleStatus::Error);
    let failure = result.failure().unwrap();
    assert!(failure.error.contains("calendar"));
}

#[test]
fn single_subject_is_scheduled() {
    let result = create_schedule(&SchedulerConfig::default(), &minimal_inputs(), 5, None);

    assert_eq!(result.status, ScheduleStatus::Success);
    let success = result.success().unwrap();
    let placed: Vec<&String> = success.slot_assignments.values().flatten().collect();
    assert_eq!(placed, vec![&String::from("국어")]);
    assert_eq!(success.days, vec![String::from("제1일")]);
    assert_eq!(success.slots.len(), 2);
}

#[test]
fn oversized_subject_is_structurally_infeasible() {
    let mut inputs = minimal_inputs();
    inputs
        .subjects
        .insert(String::from("긴과목"), SubjectInfo {
            duration: Some(120),
            ..SubjectInfo::default()
        });

    let result = create_schedule(&SchedulerConfig::default(), &inputs, 5, None);

    assert_eq!(result.status, ScheduleStatus::Infeasible);
    let failure = result.failure().unwrap();
    assert!(failure.details.iter().any(|d| d.contains("긴과목")));
    assert!(failure.diagnosis.is_some());
}

#[test]
fn callback_reports_increasing_milestones() {
    use std::sync::{Arc, Mutex};

    let progress: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let progress_for_callback = Arc::clone(&progress);
    let callback = move |_message: &str, percent: u8| {
        progress_for_callback.lock().unwrap().push(percent);
    };

    let result = create_schedule(
        &SchedulerConfig::default(),
        &minimal_inputs(),
        5,
        Some(&callback),
    );
    assert_eq!(result.status, ScheduleStatus::Success);

    drop(callback);
    let seen = Arc::try_unwrap(progress).unwrap().into_inner().unwrap();
    assert!(seen.contains(&10));
    assert!(seen.contains(&100));
    let mut sorted = seen.clone();
    sorted.sort_unstable();
    assert_eq!(seen, sorted, "milestones must not go backwards");
}

#[test]
fn seeded_runs_are_deterministic() {
    let mut inputs = minimal_inputs();
    // A second subject conflicting with the first gives the clique stage
    // real work.
    inputs.subjects.insert(
        String::from("수학"),
        SubjectInfo {
            duration: Some(50),
            ..SubjectInfo::default()
        },
    );
    inputs.roster.insert(
        String::from("학생1"),
        BTreeSet::from([String::from("국어"), String::from("수학")]),
    );

    let config = SchedulerConfig {
        random_seed: Some(99),
        ..SchedulerConfig::default()
    };

    let first = create_schedule(&config, &inputs, 5, None);
    let second = create_schedule(&config, &inputs, 5, None);

    assert_eq!(first.status, ScheduleStatus::Success);
    assert_eq!(
        first.success().unwrap().slot_assignments,
        second.success().unwrap().slot_assignments
    );
}
