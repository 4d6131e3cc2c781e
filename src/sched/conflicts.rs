
use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use super::SubjectInfo;

/// Symmetric adjacency map: subject → subjects it cannot share a slot with.
pub type AdjacencyMap = BTreeMap<String, BTreeSet<String>>;

/// An unordered pair of subjects, as edited through the front-end.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubjectPair {
    pub subject1: String,
    pub subject2: String,
}

impl SubjectPair {
    pub fn new<A: Into<String>, B: Into<String>>(subject1: A, subject2: B) -> Self {
        SubjectPair {
            subject1: subject1.into(),
            subject2: subject2.into(),
        }
    }
}

/// User edits over the derived conflict sets.
///
/// `individual` and `same_grade` are replacement sources for the student
/// flavor: the first non-empty of individual → same-grade → enrollment
/// wins. The `*_added` / `*_removed` lists are overlays applied on top of
/// whichever base was picked.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ConflictEdits {
    #[serde(default)]
    pub individual: Vec<SubjectPair>,
    #[serde(default)]
    pub same_grade: Vec<SubjectPair>,
    #[serde(default)]
    pub same_grade_removed: Vec<SubjectPair>,
    #[serde(default)]
    pub student_added: Vec<SubjectPair>,
    #[serde(default)]
    pub student_removed: Vec<SubjectPair>,
    #[serde(default)]
    pub listening_added: Vec<SubjectPair>,
    #[serde(default)]
    pub listening_removed: Vec<SubjectPair>,
    #[serde(default)]
    pub teacher_added: Vec<SubjectPair>,
    #[serde(default)]
    pub teacher_removed: Vec<SubjectPair>,
}

/// The three merged conflict flavors consumed by the model builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictMaps {
    pub student: AdjacencyMap,
    pub listening: AdjacencyMap,
    pub teacher: AdjacencyMap,
}

impl ConflictMaps {
    /// Union of the three flavors, used by the clique preprocessor.
    pub fn union(&self) -> AdjacencyMap {
        let mut merged = self.student.clone();
        for source in [&self.listening, &self.teacher] {
            for (subject, others) in source {
                merged
                    .entry(subject.clone())
                    .or_default()
                    .extend(others.iter().cloned());
            }
        }
        merged
    }

    /// Unordered pairs of the union, each emitted once (lexicographic).
    pub fn union_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = BTreeSet::new();
        for (a, others) in self.union() {
            for b in others {
                if a < b {
                    pairs.insert((a.clone(), b));
                } else {
                    pairs.insert((b, a.clone()));
                }
            }
        }
        pairs.into_iter().collect()
    }
}

fn add_edge(map: &mut AdjacencyMap, a: &str, b: &str) {
    map.entry(a.to_owned()).or_default().insert(b.to_owned());
    map.entry(b.to_owned()).or_default().insert(a.to_owned());
}

fn prune_empty(map: &mut AdjacencyMap) {
    map.retain(|_, others| !others.is_empty());
}

/// Student conflicts derived from co-enrollment: two subjects conflict as
/// soon as one student takes both.
pub fn enrollment_pairs(roster: &BTreeMap<String, BTreeSet<String>>) -> AdjacencyMap {
    let mut map = AdjacencyMap::new();
    for subjects in roster.values() {
        let list: Vec<&String> = subjects.iter().collect();
        for (i, a) in list.iter().enumerate() {
            for b in &list[i + 1..] {
                add_edge(&mut map, a, b);
            }
        }
    }
    map
}

/// Listening conflicts derived from the listening-test flag: all pairs of
/// flagged subjects.
pub fn listening_map(subjects: &BTreeMap<String, SubjectInfo>) -> AdjacencyMap {
    let flagged: Vec<&String> = subjects
        .iter()
        .filter(|(_, info)| info.listening)
        .map(|(name, _)| name)
        .collect();

    let mut map = AdjacencyMap::new();
    for (i, a) in flagged.iter().enumerate() {
        for b in &flagged[i + 1..] {
            add_edge(&mut map, a, b);
        }
    }
    map
}

/// Teacher conflicts derived from invigilator overlap: subjects whose
/// teacher sets intersect.
pub fn teacher_map(subjects: &BTreeMap<String, SubjectInfo>) -> AdjacencyMap {
    let list: Vec<(&String, &SubjectInfo)> = subjects.iter().collect();

    let mut map = AdjacencyMap::new();
    for (i, (a, info_a)) in list.iter().enumerate() {
        if info_a.teachers.is_empty() {
            continue;
        }
        for (b, info_b) in &list[i + 1..] {
            if info_a.teachers.intersection(&info_b.teachers).next().is_some() {
                add_edge(&mut map, a, b);
            }
        }
    }
    map
}

/// Grade tags of a subject: comma-separated, whitespace-tolerant.
pub fn grade_tags(grade: &str) -> BTreeSet<String> {
    grade
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Same-grade pairs derived from the subject catalogue: subjects sharing
/// any grade tag conflict pairwise.
pub fn same_grade_pairs(subjects: &BTreeMap<String, SubjectInfo>) -> Vec<SubjectPair> {
    let tagged: Vec<(&String, BTreeSet<String>)> = subjects
        .iter()
        .map(|(name, info)| (name, grade_tags(&info.grade)))
        .filter(|(_, tags)| !tags.is_empty())
        .collect();

    let mut pairs = Vec::new();
    for (i, (a, tags_a)) in tagged.iter().enumerate() {
        for (b, tags_b) in &tagged[i + 1..] {
            if tags_a.intersection(tags_b).next().is_some() {
                pairs.push(SubjectPair::new((*a).clone(), (*b).clone()));
            }
        }
    }
    pairs
}

fn pairs_to_map(pairs: &[SubjectPair]) -> AdjacencyMap {
    let mut map = AdjacencyMap::new();
    for pair in pairs {
        add_edge(&mut map, &pair.subject1, &pair.subject2);
    }
    map
}

fn removed_set(removed: &[SubjectPair]) -> BTreeSet<(String, String)> {
    let mut set = BTreeSet::new();
    for pair in removed {
        set.insert((pair.subject1.clone(), pair.subject2.clone()));
        set.insert((pair.subject2.clone(), pair.subject1.clone()));
    }
    set
}

/// Applies edits on a base map: removals first, then additions (removals
/// win), then symmetry normalization.
pub fn merge(base: AdjacencyMap, added: &[SubjectPair], removed: &[SubjectPair]) -> AdjacencyMap {
    let removed_pairs = removed_set(removed);

    let mut merged = base;
    for (subject, others) in merged.iter_mut() {
        others.retain(|other| !removed_pairs.contains(&(subject.clone(), other.clone())));
    }

    for pair in added {
        if removed_pairs.contains(&(pair.subject1.clone(), pair.subject2.clone())) {
            continue;
        }
        add_edge(&mut merged, &pair.subject1, &pair.subject2);
    }

    // Symmetry normalization: mirror every directed edge.
    let edges: Vec<(String, String)> = merged
        .iter()
        .flat_map(|(a, others)| others.iter().map(move |b| (a.clone(), b.clone())))
        .collect();
    for (a, b) in edges {
        merged.entry(b).or_default().insert(a);
    }

    prune_empty(&mut merged);
    merged
}

/// Builds the three merged conflict maps from the derived bases and the
/// user edits.
pub fn aggregate(
    subjects: &BTreeMap<String, SubjectInfo>,
    roster: &BTreeMap<String, BTreeSet<String>>,
    edits: &ConflictEdits,
) -> ConflictMaps {
    // Student base is a replacement, not an overlay: the first non-empty
    // source wins.
    let student_base = if !edits.individual.is_empty() {
        pairs_to_map(&edits.individual)
    } else if !edits.same_grade.is_empty() {
        merge(
            pairs_to_map(&edits.same_grade),
            &[],
            &edits.same_grade_removed,
        )
    } else {
        enrollment_pairs(roster)
    };

    ConflictMaps {
        student: merge(student_base, &edits.student_added, &edits.student_removed),
        listening: merge(
            listening_map(subjects),
            &edits.listening_added,
            &edits.listening_removed,
        ),
        teacher: merge(
            teacher_map(subjects),
            &edits.teacher_added,
            &edits.teacher_removed,
        ),
    }
}
