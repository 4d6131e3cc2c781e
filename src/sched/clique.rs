
use std::collections::{BTreeMap, BTreeSet};

use super::calendar::SlotTable;
use super::conflicts::ConflictMaps;
use super::model::Variable;
use super::random::RandomGen;
use super::SubjectInfo;

/// What the maximum-clique search found, kept for the result payload and
/// for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliqueReport {
    pub max_clique: Vec<String>,
    pub maximal_clique_count: usize,
    pub max_clique_count: usize,
    pub valid_cliques: Vec<Vec<String>>,
    pub min_clique_size: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
}

/// Everything the greedy placement needs to test a candidate slot.
///
/// Ban maps are expected with normalized slot ids (underscores stripped).
pub struct PlacementContext<'a> {
    pub subjects: &'a BTreeMap<String, SubjectInfo>,
    pub slots: &'a SlotTable,
    pub candidate_slots: &'a BTreeMap<String, Vec<String>>,
    pub blackouts: &'a BTreeMap<String, BTreeSet<String>>,
    pub subject_bans: &'a BTreeMap<String, BTreeSet<String>>,
    pub teacher_bans: &'a BTreeMap<String, BTreeSet<String>>,
    pub conflicts: &'a ConflictMaps,
    pub roster: &'a BTreeMap<String, BTreeSet<String>>,
    pub hard_subjects: &'a BTreeMap<String, bool>,
    pub max_exams_per_day: Option<u32>,
    pub max_hard_exams_per_day: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementOutcome {
    pub placed: BTreeMap<String, String>,
    pub unplaced: Vec<String>,
}

/// Undirected conflict graph on the subjects still free to move: an edge
/// for every pair in the union of student, listening and teacher conflicts.
pub fn conflict_graph(
    subjects: &BTreeMap<String, SubjectInfo>,
    conflicts: &ConflictMaps,
    fixed_subjects: &BTreeSet<String>,
) -> BTreeMap<String, BTreeSet<String>> {
    let available: BTreeSet<String> = subjects
        .keys()
        .filter(|s| !fixed_subjects.contains(*s))
        .cloned()
        .collect();

    let union = conflicts.union();
    let mut graph: BTreeMap<String, BTreeSet<String>> = available
        .iter()
        .map(|s| (s.clone(), BTreeSet::new()))
        .collect();

    for a in &available {
        let Some(others) = union.get(a) else {
            continue;
        };
        for b in others {
            if b != a && available.contains(b) {
                graph.get_mut(a).expect("node is available").insert(b.clone());
                graph.get_mut(b).expect("node is available").insert(a.clone());
            }
        }
    }

    graph
}

/// Bron–Kerbosch with pivoting over a node-complete adjacency map.
fn bron_kerbosch(
    graph: &BTreeMap<String, BTreeSet<String>>,
    current: &mut Vec<String>,
    mut candidates: BTreeSet<String>,
    mut excluded: BTreeSet<String>,
    cliques: &mut Vec<Vec<String>>,
) {
    if candidates.is_empty() && excluded.is_empty() {
        cliques.push(current.clone());
        return;
    }

    let pivot = candidates
        .iter()
        .chain(excluded.iter())
        .max_by_key(|v| graph[*v].intersection(&candidates).count())
        .expect("candidates or excluded is non-empty")
        .clone();

    let branch: Vec<String> = candidates.difference(&graph[&pivot]).cloned().collect();

    for v in branch {
        let neighbours = &graph[&v];
        current.push(v.clone());
        bron_kerbosch(
            graph,
            current,
            candidates.intersection(neighbours).cloned().collect(),
            excluded.intersection(neighbours).cloned().collect(),
            cliques,
        );
        current.pop();
        candidates.remove(&v);
        excluded.insert(v);
    }
}

/// Enumerates maximal cliques of the conflict graph and picks one maximum
/// clique at random. Cliques at least `max(⌈0.10·n⌉, 3)` large are kept in
/// the report.
pub fn find_maximum_cliques<R: RandomGen>(
    subjects: &BTreeMap<String, SubjectInfo>,
    conflicts: &ConflictMaps,
    fixed_subjects: &BTreeSet<String>,
    rng: &mut R,
) -> CliqueReport {
    let graph = conflict_graph(subjects, conflicts, fixed_subjects);
    let graph_nodes = graph.len();
    let graph_edges = graph.values().map(|n| n.len()).sum::<usize>() / 2;
    let min_clique_size = ((subjects.len() + 9) / 10).max(3);

    if graph.is_empty() {
        return CliqueReport {
            min_clique_size,
            ..CliqueReport::default()
        };
    }

    let mut cliques = Vec::new();
    bron_kerbosch(
        &graph,
        &mut Vec::new(),
        graph.keys().cloned().collect(),
        BTreeSet::new(),
        &mut cliques,
    );

    if cliques.is_empty() {
        return CliqueReport {
            min_clique_size,
            graph_nodes,
            graph_edges,
            ..CliqueReport::default()
        };
    }

    let max_size = cliques.iter().map(|c| c.len()).max().expect("cliques is non-empty");
    let max_cliques: Vec<Vec<String>> = cliques
        .iter()
        .filter(|c| c.len() == max_size)
        .cloned()
        .collect();
    let valid_cliques: Vec<Vec<String>> = cliques
        .iter()
        .filter(|c| c.len() >= min_clique_size)
        .cloned()
        .collect();

    let max_clique = rng.rand_elem(&max_cliques);

    CliqueReport {
        max_clique,
        maximal_clique_count: cliques.len(),
        max_clique_count: max_cliques.len(),
        valid_cliques,
        min_clique_size,
        graph_nodes,
        graph_edges,
    }
}

fn conflicts_with_occupants(
    subject: &str,
    occupants: &[String],
    conflicts: &ConflictMaps,
) -> bool {
    for map in [&conflicts.student, &conflicts.listening, &conflicts.teacher] {
        if let Some(others) = map.get(subject) {
            if occupants.iter().any(|o| others.contains(o)) {
                return true;
            }
        }
        for occupant in occupants {
            if let Some(others) = map.get(occupant) {
                if others.contains(subject) {
                    return true;
                }
            }
        }
    }
    false
}

fn burden_allows(
    subject: &str,
    slot_id: &str,
    ctx: &PlacementContext,
    current: &BTreeMap<String, Vec<String>>,
) -> bool {
    if ctx.max_exams_per_day.is_none() && ctx.max_hard_exams_per_day.is_none() {
        return true;
    }
    let Some(day) = ctx.slots.day_of(slot_id) else {
        return true;
    };

    let mut subjects_today: BTreeSet<&str> = BTreeSet::new();
    for slot in ctx.slots.slots_of_day(day) {
        if let Some(occupants) = current.get(&slot.id) {
            subjects_today.extend(occupants.iter().map(String::as_str));
        }
    }
    subjects_today.insert(subject);

    for taken in ctx.roster.values() {
        let exams_today: Vec<&str> = taken
            .iter()
            .map(String::as_str)
            .filter(|s| subjects_today.contains(s))
            .collect();

        if let Some(cap) = ctx.max_exams_per_day {
            if exams_today.len() > cap as usize {
                return false;
            }
        }
        if let Some(cap) = ctx.max_hard_exams_per_day {
            let hard = exams_today
                .iter()
                .filter(|s| ctx.hard_subjects.get(**s).copied().unwrap_or(false))
                .count();
            if hard > cap as usize {
                return false;
            }
        }
    }

    true
}

/// Candidate slots for one subject under the current partial placement,
/// split into already-occupied and empty ones (both in slot order).
fn valid_slots_for(
    subject: &str,
    ctx: &PlacementContext,
    current: &BTreeMap<String, Vec<String>>,
) -> (Vec<String>, Vec<String>) {
    let mut occupied = Vec::new();
    let mut empty = Vec::new();

    let no_candidates = Vec::new();
    let candidates = ctx.candidate_slots.get(subject).unwrap_or(&no_candidates);
    let info = ctx.subjects.get(subject);

    'slots: for slot in ctx.slots.slots() {
        if !candidates.contains(&slot.id) {
            continue;
        }

        if let Some(info) = info {
            for teacher in &info.teachers {
                if let Some(blocked) = ctx.blackouts.get(teacher) {
                    if blocked.contains(&slot.id) {
                        continue 'slots;
                    }
                }
                if let Some(banned) = ctx.teacher_bans.get(teacher) {
                    if banned.contains(&slot.id) {
                        continue 'slots;
                    }
                }
            }
        }
        if let Some(banned) = ctx.subject_bans.get(subject) {
            if banned.contains(&slot.id) {
                continue;
            }
        }

        if let Some(occupants) = current.get(&slot.id) {
            if conflicts_with_occupants(subject, occupants, ctx.conflicts) {
                continue;
            }
        }

        if !burden_allows(subject, &slot.id, ctx, current) {
            continue;
        }

        let is_occupied = current.get(&slot.id).map_or(false, |o| !o.is_empty());
        if is_occupied {
            occupied.push(slot.id.clone());
        } else {
            empty.push(slot.id.clone());
        }
    }

    (occupied, empty)
}

/// Greedily places the clique members one by one, preferring slots that
/// already hold a subject so the timetable stays compact. Subjects with no
/// viable slot are reported unplaced; they never abort the run.
pub fn place_clique_subjects<R: RandomGen>(
    clique: &[String],
    ctx: &PlacementContext,
    current: &mut BTreeMap<String, Vec<String>>,
    rng: &mut R,
) -> PlacementOutcome {
    let mut outcome = PlacementOutcome::default();

    for subject in clique {
        if !ctx.subjects.contains_key(subject) {
            outcome.unplaced.push(subject.clone());
            continue;
        }

        let (occupied, empty) = valid_slots_for(subject, ctx, current);
        let pool = if !occupied.is_empty() { occupied } else { empty };

        if pool.is_empty() {
            outcome.unplaced.push(subject.clone());
            continue;
        }

        let slot = rng.rand_elem(&pool);
        current.entry(slot.clone()).or_default().push(subject.clone());
        outcome.placed.insert(subject.clone(), slot);
    }

    outcome
}

/// Solver hints from a partial placement: 1 for each placed pair, 0 for
/// every other assignment variable. Hints only steer value ordering.
pub fn hints_from_placement(
    placed: &BTreeMap<String, String>,
    candidate_slots: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<Variable, i32> {
    let mut hints = BTreeMap::new();
    for (subject, candidates) in candidate_slots {
        for slot in candidates {
            let value = i32::from(placed.get(subject) == Some(slot));
            hints.insert(
                Variable::Assign {
                    subject: subject.clone(),
                    slot: slot.clone(),
                },
                value,
            );
        }
    }
    hints
}
