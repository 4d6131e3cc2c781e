#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use crate::ilp::linexpr::{Sign, VariableName};
use crate::ilp::{ObjectiveSense, Problem, Solution};

use super::SolveStatus;

/// Depth-first branch-and-bound with bounds-consistency propagation.
///
/// Branches on the first unfixed variable in declaration order; binary
/// variables try 1 before 0, wider domains ascend from their lower bound,
/// and a hint value is always tried first. Every tightening is recorded on
/// a trail so backtracking restores domains exactly. Once an incumbent is
/// known the objective is propagated as an extra `<=` row, pruning any
/// subtree that cannot beat it.
#[derive(Debug, Clone, Default)]
pub struct Solver {}

impl Solver {
    pub fn new() -> Self {
        Solver {}
    }
}

struct Row {
    entries: Vec<(usize, i32)>,
    sign: Sign,
    constant: i32,
}

struct Decision {
    var: usize,
    remaining: Vec<i32>,
    trail_len: usize,
}

enum Tighten {
    Unchanged,
    Changed,
    Empty,
}

enum ObjStep {
    Stable,
    Changed,
    Conflict,
}

enum Advance {
    Stepped,
    Exhausted,
    TimedOut,
}

struct Search<'a, V: VariableName> {
    problem: &'a Problem<V>,
    rows: Vec<Row>,
    obj_entries: Vec<(usize, i32)>,
    lo: Vec<i32>,
    hi: Vec<i32>,
    hints: Vec<Option<i32>>,
    trail: Vec<(usize, i32, i32)>,
    decisions: Vec<Decision>,
    queue: VecDeque<usize>,
    in_queue: Vec<bool>,
    best: Option<(Vec<i32>, i32)>,
    bound: Option<i32>,
}

fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

fn div_ceil(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && (a < 0) == (b < 0) {
        q + 1
    } else {
        q
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

impl<'a, V: VariableName> Search<'a, V> {
    fn new(problem: &'a Problem<V>, hints: &BTreeMap<V, i32>) -> Self {
        let rows: Vec<Row> = (0..problem.constraint_count())
            .map(|r| Row {
                entries: problem.row_entries(r),
                sign: problem.row_sign(r),
                constant: problem.row_constant(r),
            })
            .collect();

        let obj_entries: Vec<(usize, i32)> = match problem.get_objective_sense() {
            ObjectiveSense::Minimize => problem.objective_row().to_vec(),
            ObjectiveSense::Maximize => problem
                .objective_row()
                .iter()
                .map(|&(j, c)| (j, -c))
                .collect(),
        };

        let mut hint_values = vec![None; problem.var_count()];
        for (var, value) in hints {
            if let Some(j) = problem.variable_index(var) {
                hint_values[j] = Some(*value);
            }
        }

        let row_count = rows.len();

        Search {
            problem,
            rows,
            obj_entries,
            lo: problem.initial_lo().to_vec(),
            hi: problem.initial_hi().to_vec(),
            hints: hint_values,
            trail: Vec::new(),
            decisions: Vec::new(),
            queue: VecDeque::new(),
            in_queue: vec![false; row_count],
            best: None,
            bound: None,
        }
    }

    fn tighten(&mut self, j: usize, new_lo: Option<i32>, new_hi: Option<i32>) -> Tighten {
        let mut nl = self.lo[j];
        let mut nh = self.hi[j];
        if let Some(v) = new_lo {
            nl = nl.max(v);
        }
        if let Some(v) = new_hi {
            nh = nh.min(v);
        }
        if nl == self.lo[j] && nh == self.hi[j] {
            return Tighten::Unchanged;
        }
        self.trail.push((j, self.lo[j], self.hi[j]));
        self.lo[j] = nl;
        self.hi[j] = nh;
        if nl > nh {
            Tighten::Empty
        } else {
            Tighten::Changed
        }
    }

    fn enqueue_rows_of(&mut self, j: usize) {
        for &r in self.problem.rows_of(j) {
            if !self.in_queue[r] {
                self.in_queue[r] = true;
                self.queue.push_back(r);
            }
        }
    }

    fn clear_queue(&mut self) {
        while let Some(r) = self.queue.pop_front() {
            self.in_queue[r] = false;
        }
    }

    fn undo_to(&mut self, len: usize) {
        while self.trail.len() > len {
            let (j, l, h) = self.trail.pop().expect("trail is longer than len");
            self.lo[j] = l;
            self.hi[j] = h;
        }
    }

    /// Bounds-consistency pass over one row. Returns false on a wipe-out.
    fn propagate_row(&mut self, r: usize) -> bool {
        let sign = self.rows[r].sign;
        let constant = self.rows[r].constant as i64;
        let n = self.rows[r].entries.len();

        let mut min_sum = constant;
        let mut max_sum = constant;
        for i in 0..n {
            let (j, c) = self.rows[r].entries[i];
            let c = c as i64;
            if c > 0 {
                min_sum += c * self.lo[j] as i64;
                max_sum += c * self.hi[j] as i64;
            } else {
                min_sum += c * self.hi[j] as i64;
                max_sum += c * self.lo[j] as i64;
            }
        }

        match sign {
            Sign::LessThan => {
                if min_sum > 0 {
                    return false;
                }
                if max_sum <= 0 {
                    return true;
                }
            }
            Sign::Equals => {
                if min_sum > 0 || max_sum < 0 {
                    return false;
                }
            }
        }

        for i in 0..n {
            let (j, c) = self.rows[r].entries[i];
            let c64 = c as i64;
            let (contrib_min, contrib_max) = if c64 > 0 {
                (c64 * self.lo[j] as i64, c64 * self.hi[j] as i64)
            } else {
                (c64 * self.hi[j] as i64, c64 * self.lo[j] as i64)
            };

            // c*x must stay below what the other terms leave room for.
            let limit = -(min_sum - contrib_min);
            let step = if c64 > 0 {
                self.tighten(j, None, Some(clamp_i32(div_floor(limit, c64))))
            } else {
                self.tighten(j, Some(clamp_i32(div_ceil(limit, c64))), None)
            };
            match step {
                Tighten::Empty => return false,
                Tighten::Changed => self.enqueue_rows_of(j),
                Tighten::Unchanged => {}
            }

            if sign == Sign::Equals {
                // Equality also bounds c*x from below.
                let limit = -(max_sum - contrib_max);
                let step = if c64 > 0 {
                    self.tighten(j, Some(clamp_i32(div_ceil(limit, c64))), None)
                } else {
                    self.tighten(j, None, Some(clamp_i32(div_floor(limit, c64))))
                };
                match step {
                    Tighten::Empty => return false,
                    Tighten::Changed => self.enqueue_rows_of(j),
                    Tighten::Unchanged => {}
                }
            }
        }

        true
    }

    /// Propagates the incumbent bound as a pseudo-row over the objective.
    fn tighten_objective(&mut self) -> ObjStep {
        let Some(bound) = self.bound else {
            return ObjStep::Stable;
        };
        let k = match self.problem.get_objective_sense() {
            ObjectiveSense::Minimize => self.problem.objective_constant() as i64 - bound as i64,
            ObjectiveSense::Maximize => bound as i64 - self.problem.objective_constant() as i64,
        };

        let n = self.obj_entries.len();
        let mut min_sum = k;
        let mut max_sum = k;
        for i in 0..n {
            let (j, c) = self.obj_entries[i];
            let c = c as i64;
            if c > 0 {
                min_sum += c * self.lo[j] as i64;
                max_sum += c * self.hi[j] as i64;
            } else {
                min_sum += c * self.hi[j] as i64;
                max_sum += c * self.lo[j] as i64;
            }
        }

        if min_sum > 0 {
            return ObjStep::Conflict;
        }
        if max_sum <= 0 {
            return ObjStep::Stable;
        }

        let mut changed = false;
        for i in 0..n {
            let (j, c) = self.obj_entries[i];
            let c64 = c as i64;
            let contrib_min = if c64 > 0 {
                c64 * self.lo[j] as i64
            } else {
                c64 * self.hi[j] as i64
            };

            let limit = -(min_sum - contrib_min);
            let step = if c64 > 0 {
                self.tighten(j, None, Some(clamp_i32(div_floor(limit, c64))))
            } else {
                self.tighten(j, Some(clamp_i32(div_ceil(limit, c64))), None)
            };
            match step {
                Tighten::Empty => return ObjStep::Conflict,
                Tighten::Changed => {
                    self.enqueue_rows_of(j);
                    changed = true;
                }
                Tighten::Unchanged => {}
            }
        }

        if changed {
            ObjStep::Changed
        } else {
            ObjStep::Stable
        }
    }

    /// Runs propagation to a fixed point. Returns false on conflict.
    fn propagate(&mut self) -> bool {
        loop {
            while let Some(r) = self.queue.pop_front() {
                self.in_queue[r] = false;
                if !self.propagate_row(r) {
                    self.clear_queue();
                    return false;
                }
            }
            match self.tighten_objective() {
                ObjStep::Conflict => {
                    self.clear_queue();
                    return false;
                }
                ObjStep::Changed => continue,
                ObjStep::Stable => return true,
            }
        }
    }

    fn first_unfixed(&self) -> Option<usize> {
        (0..self.lo.len()).find(|&j| self.lo[j] < self.hi[j])
    }

    fn value_candidates(&self, j: usize) -> Vec<i32> {
        let lo = self.lo[j];
        let hi = self.hi[j];
        let mut values: Vec<i32> = if self.problem.is_binary(j) {
            (lo..=hi).rev().collect()
        } else {
            (lo..=hi).collect()
        };
        if let Some(h) = self.hints[j] {
            if let Some(pos) = values.iter().position(|&v| v == h) {
                values.remove(pos);
                values.insert(0, h);
            }
        }
        values
    }

    /// Applies the next untried value of the deepest decision, unwinding
    /// exhausted decisions along the way.
    fn advance(&mut self, deadline: Option<Instant>) -> Advance {
        loop {
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return Advance::TimedOut;
                }
            }

            let (var, trail_len, next) = {
                let Some(decision) = self.decisions.last_mut() else {
                    return Advance::Exhausted;
                };
                let next = if decision.remaining.is_empty() {
                    None
                } else {
                    Some(decision.remaining.remove(0))
                };
                (decision.var, decision.trail_len, next)
            };

            self.undo_to(trail_len);

            match next {
                None => {
                    self.decisions.pop();
                }
                Some(value) => {
                    if matches!(
                        self.tighten(var, Some(value), Some(value)),
                        Tighten::Empty
                    ) {
                        continue;
                    }
                    self.enqueue_rows_of(var);
                    if self.propagate() {
                        return Advance::Stepped;
                    }
                }
            }
        }
    }
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.map_or(false, |d| Instant::now() >= d)
}

impl<V: VariableName> super::Solver<V> for Solver {
    fn solve<'a>(
        &self,
        problem: &'a Problem<V>,
        hints: &BTreeMap<V, i32>,
        deadline: Option<Instant>,
    ) -> SolveStatus<'a, V> {
        let mut search = Search::new(problem, hints);

        for r in 0..search.rows.len() {
            search.queue.push_back(r);
            search.in_queue[r] = true;
        }
        if !search.propagate() {
            return SolveStatus::Infeasible;
        }

        loop {
            if past(deadline) {
                return match search.best.take() {
                    Some((values, _)) => SolveStatus::Feasible(Solution::new(problem, values)),
                    None => SolveStatus::Unknown,
                };
            }

            match search.first_unfixed() {
                None => {
                    let values = search.lo.clone();
                    debug_assert!(problem.is_feasible(&values));

                    if !problem.has_objective() {
                        return SolveStatus::Optimal(Solution::new(problem, values));
                    }

                    let objective = problem.objective_value_of(&values);
                    let better = match (&search.best, problem.get_objective_sense()) {
                        (None, _) => true,
                        (Some((_, b)), ObjectiveSense::Minimize) => objective < *b,
                        (Some((_, b)), ObjectiveSense::Maximize) => objective > *b,
                    };
                    if better {
                        search.bound = Some(match problem.get_objective_sense() {
                            ObjectiveSense::Minimize => objective - 1,
                            ObjectiveSense::Maximize => objective + 1,
                        });
                        search.best = Some((values, objective));
                    }

                    match search.advance(deadline) {
                        Advance::Stepped => {}
                        Advance::Exhausted => return finish(search.best, problem),
                        Advance::TimedOut => return timed_out(search.best, problem),
                    }
                }
                Some(j) => {
                    let remaining = search.value_candidates(j);
                    let trail_len = search.trail.len();
                    search.decisions.push(Decision {
                        var: j,
                        remaining,
                        trail_len,
                    });
                    match search.advance(deadline) {
                        Advance::Stepped => {}
                        Advance::Exhausted => return finish(search.best, problem),
                        Advance::TimedOut => return timed_out(search.best, problem),
                    }
                }
            }
        }
    }
}

fn finish<V: VariableName>(
    best: Option<(Vec<i32>, i32)>,
    problem: &Problem<V>,
) -> SolveStatus<'_, V> {
    match best {
        Some((values, _)) => SolveStatus::Optimal(Solution::new(problem, values)),
        None => SolveStatus::Infeasible,
    }
}

fn timed_out<V: VariableName>(
    best: Option<(Vec<i32>, i32)>,
    problem: &Problem<V>,
) -> SolveStatus<'_, V> {
    match best {
        Some((values, _)) => SolveStatus::Feasible(Solution::new(problem, values)),
        None => SolveStatus::Unknown,
    }
}
