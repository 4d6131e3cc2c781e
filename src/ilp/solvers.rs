pub mod backtracking;

use std::collections::BTreeMap;
use std::time::Instant;

use super::linexpr::VariableName;
use super::{Problem, Solution};

/// Outcome of a solver run.
///
/// `Feasible` is returned when the deadline expired while an incumbent was
/// known; `Unknown` when it expired with none. Without a deadline a run
/// always ends in `Optimal` or `Infeasible`.
#[derive(Debug, Clone)]
pub enum SolveStatus<'a, V: VariableName> {
    Optimal(Solution<'a, V>),
    Feasible(Solution<'a, V>),
    Infeasible,
    Unknown,
}

impl<'a, V: VariableName> SolveStatus<'a, V> {
    pub fn solution(self) -> Option<Solution<'a, V>> {
        match self {
            SolveStatus::Optimal(s) | SolveStatus::Feasible(s) => Some(s),
            SolveStatus::Infeasible | SolveStatus::Unknown => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SolveStatus::Optimal(_) => "OPTIMAL",
            SolveStatus::Feasible(_) => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Solver seam: a complete search over a [Problem].
///
/// Hints suggest a value to try first for a variable; they never constrain
/// the search. The deadline is the sole cutoff.
pub trait Solver<V: VariableName>: Send + Sync {
    fn solve<'a>(
        &self,
        problem: &'a Problem<V>,
        hints: &BTreeMap<V, i32>,
        deadline: Option<Instant>,
    ) -> SolveStatus<'a, V>;
}
