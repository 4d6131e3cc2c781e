
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::calendar::SlotTable;

/// Per-student load derived from a successful assignment.
///
/// The `*_per_day` vectors are indexed like `days`; the `max_*` maps hold
/// each student's worst day.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct StudentAnalysis {
    pub max_exams_per_day: BTreeMap<String, u32>,
    pub max_hard_exams_per_day: BTreeMap<String, u32>,
    pub exams_per_day: BTreeMap<String, Vec<u32>>,
    pub hard_exams_per_day: BTreeMap<String, Vec<u32>>,
    pub exam_subjects_per_day: BTreeMap<String, Vec<Vec<String>>>,
    pub hard_exam_subjects_per_day: BTreeMap<String, Vec<Vec<String>>>,
}

/// Derives the per-student daily exam and hard-exam vectors.
pub fn analyze(
    assignments: &BTreeMap<String, Vec<String>>,
    roster: &BTreeMap<String, BTreeSet<String>>,
    hard_subjects: &BTreeMap<String, bool>,
    slots: &SlotTable,
) -> StudentAnalysis {
    let days = slots.day_keys();

    // subject → day of its assigned slot
    let mut day_of_subject: BTreeMap<String, String> = BTreeMap::new();
    for (slot_id, subjects) in assignments {
        if let Some(day) = slots.day_of(slot_id) {
            for subject in subjects {
                day_of_subject.insert(subject.clone(), day.to_owned());
            }
        }
    }

    let mut analysis = StudentAnalysis::default();

    for (student, taken) in roster {
        let mut exam_counts = Vec::with_capacity(days.len());
        let mut hard_counts = Vec::with_capacity(days.len());
        let mut exam_subjects = Vec::with_capacity(days.len());
        let mut hard_exam_subjects = Vec::with_capacity(days.len());

        for day in &days {
            let today: Vec<String> = taken
                .iter()
                .filter(|subject| day_of_subject.get(*subject) == Some(day))
                .cloned()
                .collect();
            let hard_today: Vec<String> = today
                .iter()
                .filter(|subject| hard_subjects.get(*subject).copied().unwrap_or(false))
                .cloned()
                .collect();

            exam_counts.push(today.len() as u32);
            hard_counts.push(hard_today.len() as u32);
            exam_subjects.push(today);
            hard_exam_subjects.push(hard_today);
        }

        analysis
            .max_exams_per_day
            .insert(student.clone(), exam_counts.iter().copied().max().unwrap_or(0));
        analysis
            .max_hard_exams_per_day
            .insert(student.clone(), hard_counts.iter().copied().max().unwrap_or(0));
        analysis.exams_per_day.insert(student.clone(), exam_counts);
        analysis.hard_exams_per_day.insert(student.clone(), hard_counts);
        analysis
            .exam_subjects_per_day
            .insert(student.clone(), exam_subjects);
        analysis
            .hard_exam_subjects_per_day
            .insert(student.clone(), hard_exam_subjects);
    }

    analysis
}

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct DistributionBucket {
    pub count: usize,
    pub students: Vec<String>,
}

/// Headline numbers plus the two worst-day histograms.
///
/// Buckets run from 1 up to the configured cap; without a cap they run up
/// to the observed maximum, so an empty roster yields an empty histogram.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct Summary {
    pub total_students: usize,
    pub total_subjects: usize,
    pub total_slots: usize,
    pub exam_distribution: BTreeMap<u32, DistributionBucket>,
    pub hard_exam_distribution: BTreeMap<u32, DistributionBucket>,
}

fn distribution(
    max_per_student: &BTreeMap<String, u32>,
    cap: Option<u32>,
) -> BTreeMap<u32, DistributionBucket> {
    let upper = match cap {
        Some(cap) => cap,
        None => max_per_student.values().copied().max().unwrap_or(0),
    };

    let mut histogram = BTreeMap::new();
    for bucket in 1..=upper {
        let students: Vec<String> = max_per_student
            .iter()
            .filter(|(_, &max)| max == bucket)
            .map(|(student, _)| student.clone())
            .collect();
        histogram.insert(
            bucket,
            DistributionBucket {
                count: students.len(),
                students,
            },
        );
    }
    histogram
}

pub fn summarize(
    analysis: &StudentAnalysis,
    total_subjects: usize,
    total_slots: usize,
    max_exams_per_day: Option<u32>,
    max_hard_exams_per_day: Option<u32>,
) -> Summary {
    Summary {
        total_students: analysis.max_exams_per_day.len(),
        total_subjects,
        total_slots,
        exam_distribution: distribution(&analysis.max_exams_per_day, max_exams_per_day),
        hard_exam_distribution: distribution(
            &analysis.max_hard_exams_per_day,
            max_hard_exams_per_day,
        ),
    }
}
