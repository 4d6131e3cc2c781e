#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("The exam calendar has no usable day: every candidate day is absent or tombstoned")]
    MissingCalendar,
    #[error("Day {0} has no usable period and no other day provides one")]
    MissingPeriods(String),
    #[error("Period {0} has no duration on any day")]
    MissingDuration(u32),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Editable exam-calendar description.
///
/// `exam_dates` maps day labels (`제1일`, `제2일`, …) to date strings and
/// `date_periods` maps day number → period number → period data. Period
/// entries removed by the operator stay behind as tombstones.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct Calendar {
    #[serde(rename = "학년도", default)]
    pub school_year: String,
    #[serde(rename = "학기", default)]
    pub term: String,
    #[serde(rename = "고사종류", default)]
    pub exam_kind: String,
    #[serde(rename = "시험날짜", default)]
    pub exam_dates: BTreeMap<String, String>,
    #[serde(default)]
    pub date_periods: BTreeMap<u32, BTreeMap<u32, PeriodSpec>>,
}

/// One period entry of `date_periods`: either a tombstone left by a
/// deletion, or start/end times with a duration in minutes.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PeriodSpec {
    Tombstone {
        #[serde(rename = "_deleted")]
        deleted: bool,
    },
    Times {
        #[serde(default)]
        start_time: Option<String>,
        #[serde(default)]
        end_time: Option<String>,
        #[serde(default)]
        duration: Option<serde_json::Value>,
    },
}

impl PeriodSpec {
    pub fn with_duration(minutes: u32) -> Self {
        PeriodSpec::Times {
            start_time: None,
            end_time: None,
            duration: Some(serde_json::Value::from(minutes)),
        }
    }

    pub fn tombstone() -> Self {
        PeriodSpec::Tombstone { deleted: true }
    }

    pub fn is_tombstoned(&self) -> bool {
        matches!(self, PeriodSpec::Tombstone { deleted: true })
    }

    /// Duration in minutes, coercing numeric strings; None when the entry
    /// is tombstoned or the value is absent or non-numeric.
    pub fn duration_minutes(&self) -> Option<u32> {
        match self {
            PeriodSpec::Tombstone { .. } => None,
            PeriodSpec::Times { duration, .. } => coerce_minutes(duration.as_ref()?),
        }
    }
}

fn coerce_minutes(value: &serde_json::Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    if let Some(f) = value.as_f64() {
        if f >= 0.0 && f.is_finite() {
            return Some(f.trunc() as u32);
        }
        return None;
    }
    if let Some(s) = value.as_str() {
        let s = s.trim();
        if let Ok(n) = s.parse::<u32>() {
            return Some(n);
        }
        if let Ok(f) = s.parse::<f64>() {
            if f >= 0.0 && f.is_finite() {
                return Some(f.trunc() as u32);
            }
        }
    }
    None
}

/// One exam slot: an atomic (day, period) unit. Multiple subjects may share
/// a slot; `limit_minutes` caps the duration of each of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: String,
    pub day_key: String,
    pub period: u32,
    pub limit_minutes: u32,
}

/// Ordered slot list with id-based lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlotTable {
    slots: Vec<Slot>,
    lookup: BTreeMap<String, usize>,
}

impl SlotTable {
    fn push(&mut self, slot: Slot) {
        self.lookup.insert(slot.id.clone(), self.slots.len());
        self.slots.push(slot);
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&Slot> {
        self.lookup.get(id).map(|&i| &self.slots[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup.contains_key(id)
    }

    pub fn day_of(&self, id: &str) -> Option<&str> {
        self.get(id).map(|s| s.day_key.as_str())
    }

    pub fn limit_of(&self, id: &str) -> Option<u32> {
        self.get(id).map(|s| s.limit_minutes)
    }

    /// Day keys in first-appearance order.
    pub fn day_keys(&self) -> Vec<String> {
        let mut days = Vec::new();
        for slot in &self.slots {
            if !days.contains(&slot.day_key) {
                days.push(slot.day_key.clone());
            }
        }
        days
    }

    /// Slots of one day, in table order.
    pub fn slots_of_day<'a>(&'a self, day_key: &'a str) -> impl Iterator<Item = &'a Slot> {
        self.slots.iter().filter(move |s| s.day_key == day_key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn day_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"제(\d+)일").expect("valid day-label pattern"))
}

fn period_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)교시").expect("valid period-label pattern"))
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)").expect("valid number pattern"))
}

/// Normalized slot id as used by ban lookups: underscore separators are
/// stripped, so `제3일_1교시` and `제3일1교시` address the same slot.
pub fn normalize_slot_id(id: &str) -> String {
    id.replace('_', "")
}

/// Day number from a `제N일` label, anywhere inside the text.
pub fn parse_day_number(label: &str) -> Option<u32> {
    day_regex()
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Period number from an `N교시` label, anywhere inside the text.
pub fn parse_period_number(label: &str) -> Option<u32> {
    period_regex()
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn first_number(label: &str) -> u32 {
    number_regex()
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn all_periods_tombstoned(periods: &BTreeMap<u32, PeriodSpec>) -> bool {
    periods.values().all(|p| p.is_tombstoned())
}

fn has_usable_date(date: &str) -> bool {
    let trimmed = date.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("nan")
}

/// Builds the canonical slot table from the calendar.
///
/// Day selection prefers labels with a real date string; labels with an
/// empty or `nan` date survive only when their `date_periods` entry still
/// has a live period. When nothing qualifies the selection falls back to
/// the `date_periods` keys, then to the first two date labels, and finally
/// fails with [Error::MissingCalendar]. A day without live periods borrows
/// the union of the other days' periods. Slot duration limits come from the
/// period entry, with the rounded mean of the same period on other days as
/// fallback.
pub fn build_slots(calendar: &Calendar) -> Result<SlotTable> {
    let date_periods = &calendar.date_periods;

    // Date labels in day-number order.
    let mut date_labels: Vec<&String> = calendar.exam_dates.keys().collect();
    date_labels.sort_by_key(|label| (parse_day_number(label).unwrap_or(0), (*label).clone()));

    // 1) Days with a usable date; empty dates survive on live periods.
    let mut used_day_labels: Vec<String> = Vec::new();
    for label in &date_labels {
        let date = &calendar.exam_dates[*label];
        if has_usable_date(date) {
            used_day_labels.push((*label).clone());
        } else if let Some(day_num) = parse_day_number(label) {
            if let Some(periods) = date_periods.get(&day_num) {
                if !all_periods_tombstoned(periods) {
                    used_day_labels.push((*label).clone());
                }
            }
        }
    }

    // 2) Fall back to the date_periods keys that are still live.
    if used_day_labels.is_empty() && !date_periods.is_empty() {
        used_day_labels = date_periods
            .iter()
            .filter(|(_, periods)| !all_periods_tombstoned(periods))
            .map(|(day_num, _)| format!("제{}일", day_num))
            .collect();
    }

    // 3) Last resort: the first two date labels by number.
    if used_day_labels.is_empty() {
        if calendar.exam_dates.is_empty() {
            return Err(Error::MissingCalendar);
        }
        let mut sorted: Vec<&String> = calendar.exam_dates.keys().collect();
        sorted.sort_by_key(|label| (first_number(label), (*label).clone()));
        used_day_labels = sorted.into_iter().take(2).cloned().collect();
    }

    // 4) Final filter: drop parseable labels whose periods are gone.
    let final_day_labels: Vec<String> = used_day_labels
        .into_iter()
        .filter(|label| match parse_day_number(label) {
            Some(day_num) => date_periods
                .get(&day_num)
                .map(|periods| !all_periods_tombstoned(periods))
                .unwrap_or(false),
            None => true,
        })
        .collect();

    if final_day_labels.is_empty() {
        return Err(Error::MissingCalendar);
    }

    let mut table = SlotTable::default();

    for label in &final_day_labels {
        let Some(day_num) = parse_day_number(label) else {
            continue;
        };
        let empty = BTreeMap::new();
        let periods_for_day = date_periods.get(&day_num).unwrap_or(&empty);

        let mut period_numbers: Vec<u32> = periods_for_day
            .iter()
            .filter(|(_, spec)| !spec.is_tombstoned())
            .map(|(&num, _)| num)
            .collect();

        if period_numbers.is_empty() {
            // Borrow the union of live periods from the other days.
            let mut default_periods = BTreeSet::new();
            for (&other_day, other_periods) in date_periods {
                if other_day == day_num {
                    continue;
                }
                for (&num, spec) in other_periods {
                    if !spec.is_tombstoned() {
                        default_periods.insert(num);
                    }
                }
            }
            if default_periods.is_empty() {
                return Err(Error::MissingPeriods(label.clone()));
            }
            period_numbers = default_periods.into_iter().collect();
        }

        for period in period_numbers {
            let limit = resolve_duration(date_periods, day_num, period)?;
            table.push(Slot {
                id: format!("{}{}교시", label, period),
                day_key: label.clone(),
                period,
                limit_minutes: limit,
            });
        }
    }

    if table.is_empty() {
        return Err(Error::MissingCalendar);
    }

    Ok(table)
}

fn resolve_duration(
    date_periods: &BTreeMap<u32, BTreeMap<u32, PeriodSpec>>,
    day_num: u32,
    period: u32,
) -> Result<u32> {
    if let Some(spec) = date_periods.get(&day_num).and_then(|p| p.get(&period)) {
        if !spec.is_tombstoned() {
            if let Some(minutes) = spec.duration_minutes() {
                return Ok(minutes);
            }
        }
    }
    default_period_duration(date_periods, period)
}

/// Rounded mean (ties to even) of the same period's duration across every
/// day that still carries one.
fn default_period_duration(
    date_periods: &BTreeMap<u32, BTreeMap<u32, PeriodSpec>>,
    period: u32,
) -> Result<u32> {
    let durations: Vec<u32> = date_periods
        .values()
        .filter_map(|periods| periods.get(&period))
        .filter(|spec| !spec.is_tombstoned())
        .filter_map(|spec| spec.duration_minutes())
        .collect();

    if durations.is_empty() {
        return Err(Error::MissingDuration(period));
    }

    let mean = durations.iter().map(|&d| d as f64).sum::<f64>() / durations.len() as f64;
    Ok(mean.round_ties_even() as u32)
}
