use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::ilp::solvers::{backtracking, SolveStatus, Solver as _};
use crate::ilp::{Problem, Solution};

use super::calendar::SlotTable;
use super::model::Variable;
use super::{post, StatusCallback};

/// Runs the search under the wall-clock budget.
///
/// A timer thread posts a remaining-time message roughly every second while
/// the solver works; it reads a monotonic start timestamp and observes a
/// cooperative stop flag flipped once the solver returns. The budget handed
/// to the solver is the only hard cutoff.
pub fn solve_with_progress<'a>(
    problem: &'a Problem<Variable>,
    hints: &BTreeMap<Variable, i32>,
    time_limit: Duration,
    callback: Option<&StatusCallback>,
) -> SolveStatus<'a, Variable> {
    let start = Instant::now();
    let deadline = start + time_limit;
    let stop = AtomicBool::new(false);

    // Nobody is listening: no point running a timer.
    if callback.is_none() {
        return backtracking::Solver::new().solve(problem, hints, Some(deadline));
    }

    std::thread::scope(|scope| {
        scope.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                let elapsed = start.elapsed();
                if elapsed >= time_limit {
                    break;
                }
                let remaining = (time_limit - elapsed).as_secs();
                post(
                    callback,
                    &format!("Running the optimization search... (about {}s left)", remaining),
                    75,
                );
                std::thread::sleep(Duration::from_secs(1));
            }
        });

        let status = backtracking::Solver::new().solve(problem, hints, Some(deadline));
        stop.store(true, Ordering::Relaxed);
        status
    })
}

/// Deterministic extraction: slots in table order, subjects in catalogue
/// order within each slot. Empty slots are left out of the map.
pub fn extract_assignments(
    solution: &Solution<Variable>,
    slots: &SlotTable,
    candidate_slots: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, Vec<String>> {
    let mut assignments = BTreeMap::new();

    for slot in slots.slots() {
        let assigned: Vec<String> = candidate_slots
            .iter()
            .filter(|(subject, candidates)| {
                candidates.contains(&slot.id)
                    && solution.get(&Variable::Assign {
                        subject: (*subject).clone(),
                        slot: slot.id.clone(),
                    }) == Some(1)
            })
            .map(|(subject, _)| subject.clone())
            .collect();

        if !assigned.is_empty() {
            assignments.insert(slot.id.clone(), assigned);
        }
    }

    assignments
}
