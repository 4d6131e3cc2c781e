use super::*;

fn two_day_calendar() -> Calendar {
    Calendar {
        exam_dates: BTreeMap::from([
            (String::from("제1일"), String::from("2024-07-01")),
            (String::from("제2일"), String::from("2024-07-02")),
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
                    (2, PeriodSpec::with_duration(60)),
                ]),
            ),
        ]),
        ..Calendar::default()
    }
}

#[test]
fn slots_follow_day_and_period_order() {
    let table = build_slots(&two_day_calendar()).unwrap();

    let ids: Vec<&str> = table.ids().collect();
    assert_eq!(
        ids,
        vec!["제1일1교시", "제1일2교시", "제2일1교시", "제2일2교시"]
    );
    assert_eq!(table.day_of("제1일2교시"), Some("제1일"));
    assert_eq!(table.limit_of("제1일2교시"), Some(80));
    assert_eq!(
        table.day_keys(),
        vec![String::from("제1일"), String::from("제2일")]
    );
}

#[test]
fn tombstoned_period_is_skipped() {
    let mut calendar = two_day_calendar();
    calendar
        .date_periods
        .get_mut(&1)
        .unwrap()
        .insert(2, PeriodSpec::tombstone());

    let table = build_slots(&calendar).unwrap();
    let ids: Vec<&str> = table.ids().collect();
    assert_eq!(ids, vec!["제1일1교시", "제2일1교시", "제2일2교시"]);
}

#[test]
fn wholly_tombstoned_day_is_dropped() {
    let mut calendar = two_day_calendar();
    calendar.date_periods.insert(
        2,
        BTreeMap::from([(1, PeriodSpec::tombstone()), (2, PeriodSpec::tombstone())]),
    );

    let table = build_slots(&calendar).unwrap();
    let ids: Vec<&str> = table.ids().collect();
    assert_eq!(ids, vec!["제1일1교시", "제1일2교시"]);
}

#[test]
fn empty_date_survives_on_live_periods() {
    let mut calendar = two_day_calendar();
    calendar
        .exam_dates
        .insert(String::from("제2일"), String::from(""));

    let table = build_slots(&calendar).unwrap();
    assert!(table.contains("제2일1교시"));
}

#[test]
fn nan_date_without_periods_is_dropped() {
    let mut calendar = two_day_calendar();
    calendar
        .exam_dates
        .insert(String::from("제2일"), String::from("NaN"));
    calendar.date_periods.remove(&2);

    let table = build_slots(&calendar).unwrap();
    let ids: Vec<&str> = table.ids().collect();
    assert_eq!(ids, vec!["제1일1교시", "제1일2교시"]);
}

#[test]
fn falls_back_to_date_periods_keys() {
    let calendar = Calendar {
        date_periods: BTreeMap::from([(
            3,
            BTreeMap::from([(1, PeriodSpec::with_duration(45))]),
        )]),
        ..Calendar::default()
    };

    let table = build_slots(&calendar).unwrap();
    let ids: Vec<&str> = table.ids().collect();
    assert_eq!(ids, vec!["제3일1교시"]);
}

#[test]
fn all_tombstoned_calendar_is_missing() {
    let calendar = Calendar {
        date_periods: BTreeMap::from([(
            1,
            BTreeMap::from([(1, PeriodSpec::tombstone()), (2, PeriodSpec::tombstone())]),
        )]),
        ..Calendar::default()
    };

    assert_eq!(build_slots(&calendar), Err(Error::MissingCalendar));
}

#[test]
fn empty_calendar_is_missing() {
    assert_eq!(build_slots(&Calendar::default()), Err(Error::MissingCalendar));
}

#[test]
fn day_with_empty_period_map_is_dropped() {
    let mut calendar = two_day_calendar();
    calendar.date_periods.insert(2, BTreeMap::new());

    // An empty period map counts as wholly tombstoned in the final filter.
    let table = build_slots(&calendar).unwrap();
    let ids: Vec<&str> = table.ids().collect();
    assert_eq!(ids, vec!["제1일1교시", "제1일2교시"]);
}

#[test]
fn dates_present_but_everything_tombstoned_is_missing() {
    let mut calendar = two_day_calendar();
    for periods in calendar.date_periods.values_mut() {
        for spec in periods.values_mut() {
            *spec = PeriodSpec::tombstone();
        }
    }

    assert_eq!(build_slots(&calendar), Err(Error::MissingCalendar));
}

#[test]
fn duration_mean_rounds_ties_to_even() {
    let calendar = Calendar {
        exam_dates: BTreeMap::from([
            (String::from("제1일"), String::from("d1")),
            (String::from("제2일"), String::from("d2")),
            (String::from("제3일"), String::from("d3")),
        ]),
        date_periods: BTreeMap::from([
            (1, BTreeMap::from([(1, PeriodSpec::with_duration(45))])),
            (2, BTreeMap::from([(1, PeriodSpec::with_duration(46))])),
            (
                3,
                BTreeMap::from([(1, PeriodSpec::Times {
                    start_time: None,
                    end_time: None,
                    duration: None,
                })]),
            ),
        ]),
        ..Calendar::default()
    };

    let table = build_slots(&calendar).unwrap();
    // mean(45, 46) = 45.5 → ties-to-even → 46
    assert_eq!(table.limit_of("제3일1교시"), Some(46));
}

#[test]
fn missing_sibling_duration_fails_hard() {
    let calendar = Calendar {
        exam_dates: BTreeMap::from([(String::from("제1일"), String::from("d1"))]),
        date_periods: BTreeMap::from([(
            1,
            BTreeMap::from([(1, PeriodSpec::Times {
                start_time: None,
                end_time: None,
                duration: None,
            })]),
        )]),
        ..Calendar::default()
    };

    assert_eq!(build_slots(&calendar), Err(Error::MissingDuration(1)));
}

#[test]
fn numeric_strings_coerce() {
    let spec = PeriodSpec::Times {
        start_time: None,
        end_time: None,
        duration: Some(serde_json::Value::from(" 50 ")),
    };
    assert_eq!(spec.duration_minutes(), Some(50));

    let spec = PeriodSpec::Times {
        start_time: None,
        end_time: None,
        duration: Some(serde_json::Value::from("abc")),
    };
    assert_eq!(spec.duration_minutes(), None);
}

#[test]
fn tombstones_deserialize() {
    let json = r#"{
        "시험날짜": {"제1일": "2024-07-01"},
        "date_periods": {
            "1": {
                "1": {"start_time": "08:30", "end_time": "09:20", "duration": 50},
                "2": {"_deleted": true}
            }
        }
    }"#;

    let calendar: Calendar = serde_json::from_str(json).unwrap();
    assert!(calendar.date_periods[&1][&2].is_tombstoned());
    assert_eq!(calendar.date_periods[&1][&1].duration_minutes(), Some(50));

    let table = build_slots(&calendar).unwrap();
    let ids: Vec<&str> = table.ids().collect();
    assert_eq!(ids, vec!["제1일1교시"]);
}

#[test]
fn label_parsing() {
    assert_eq!(parse_day_number("제3일"), Some(3));
    assert_eq!(parse_day_number("제12일2교시"), Some(12));
    assert_eq!(parse_day_number("day three"), None);
    assert_eq!(parse_period_number("제1일2교시"), Some(2));
    assert_eq!(parse_period_number("없음"), None);
}
