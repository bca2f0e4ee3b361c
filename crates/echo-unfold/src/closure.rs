// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Completed precedence relations over the causal history of a cut.
//!
//! Raw causal order under-constrains equivalence once concurrency is involved.
//! Completing the order with explicit incomparability pairs turns "same partial
//! order" into a plain equality check of two relations.
use std::collections::{BTreeMap, BTreeSet};

use crate::history::predecessors;
use crate::ident::{LabelId, NodeId};
use crate::occurrence::OccurrenceNet;

/// Multi-valued relation over transition labels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relation {
    pairs: BTreeMap<LabelId, BTreeSet<LabelId>>,
}

impl Relation {
    /// Creates an empty relation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `from -> to`; returns `false` if it was already present.
    pub fn insert(&mut self, from: LabelId, to: LabelId) -> bool {
        self.pairs.entry(from).or_default().insert(to)
    }

    /// Returns `true` when `from -> to` is recorded.
    #[must_use]
    pub fn contains(&self, from: LabelId, to: LabelId) -> bool {
        self.pairs.get(&from).is_some_and(|targets| targets.contains(&to))
    }

    /// Returns `true` when no pair is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of recorded pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.values().map(BTreeSet::len).sum()
    }

    /// All pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (LabelId, LabelId)> + '_ {
        self.pairs
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |to| (*from, *to)))
    }
}

/// Square boolean reachability matrix over dense indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReachMatrix {
    n: usize,
    cells: Vec<bool>,
}

impl ReachMatrix {
    /// An `n × n` matrix with only the diagonal set.
    #[must_use]
    pub fn identity(n: usize) -> Self {
        let mut matrix = Self {
            n,
            cells: vec![false; n * n],
        };
        for i in 0..n {
            matrix.set(i, i);
        }
        matrix
    }

    /// Dimension of the matrix.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Returns `true` for the empty matrix.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Sets the edge `i -> j`.
    pub fn set(&mut self, i: usize, j: usize) {
        self.cells[i * self.n + j] = true;
    }

    /// Returns `true` when `i` reaches `j`.
    #[must_use]
    pub fn reaches(&self, i: usize, j: usize) -> bool {
        self.cells[i * self.n + j]
    }

    /// Closes the matrix under transitivity in place (Floyd–Warshall style OR
    /// propagation). Closing an already closed matrix changes nothing.
    pub fn close(&mut self) {
        let n = self.n;
        for k in 0..n {
            for i in 0..n {
                if !self.reaches(i, k) {
                    continue;
                }
                for j in 0..n {
                    if self.reaches(k, j) {
                        self.set(i, j);
                    }
                }
            }
        }
    }
}

/// Completed precedence/concurrency relation of the history of `cut`.
///
/// For every condition in the causal past of a cut member that is neither the
/// member itself nor an initial or terminal condition, the edge
/// `producer -> consumer` is recorded, where `consumer` is the first successor
/// of the condition lying inside that causal past. Labels are then indexed
/// densely, the edges closed transitively, and every ordered pair of labels
/// that is incomparable in the closure is added to the relation as well.
pub fn completed_relation(net: &OccurrenceNet, cut: &[NodeId]) -> Relation {
    let mut relation = Relation::new();
    let mut order: Vec<LabelId> = Vec::new();
    let mut index: BTreeMap<LabelId, usize> = BTreeMap::new();
    let mut intern = |label: LabelId, order: &mut Vec<LabelId>| {
        index.entry(label).or_insert_with(|| {
            order.push(label);
            order.len() - 1
        });
    };

    for &member in cut {
        let past = predecessors(net, member);
        let mut conditions: Vec<NodeId> = past
            .iter()
            .copied()
            .filter(|&node| node != member && !net.is_event(node))
            .collect();
        conditions.sort_unstable();
        for condition in conditions {
            let Some(producer) = net.producer(condition) else {
                continue;
            };
            let Some(consumer) = net.post(condition).iter().copied().find(|s| past.contains(s))
            else {
                continue;
            };
            let (from, to) = (net.label(producer), net.label(consumer));
            relation.insert(from, to);
            intern(from, &mut order);
            intern(to, &mut order);
        }
    }

    let n = order.len();
    let mut reach = ReachMatrix::identity(n);
    for (i, from) in order.iter().enumerate() {
        for (j, to) in order.iter().enumerate() {
            if relation.contains(*from, *to) {
                reach.set(i, j);
            }
        }
    }
    reach.close();

    for (i, from) in order.iter().enumerate() {
        for (j, to) in order.iter().enumerate() {
            if !reach.reaches(i, j) && !reach.reaches(j, i) && !relation.contains(*from, *to) {
                relation.insert(*from, *to);
            }
        }
    }
    relation
}

/// Names of the most recent visible step towards each cut member: the
/// generating transition of a condition, or the place itself for initial
/// conditions.
pub fn maximal_labels<'a>(net: &'a OccurrenceNet, cut: &[NodeId]) -> BTreeSet<&'a str> {
    cut.iter()
        .map(|&node| match net.producer(node) {
            Some(producer) => net.proper_name(producer),
            None => net.proper_name(node),
        })
        .collect()
}

/// Directly-follows equivalence of two cuts: equal maximal label sets, neither
/// completed relation empty, and the completed relations equal.
pub fn directly_follows_equivalent(
    net: &OccurrenceNet,
    new_cut: &[NodeId],
    old_cut: &[NodeId],
) -> bool {
    if maximal_labels(net, new_cut) != maximal_labels(net, old_cut) {
        return false;
    }
    let new_relation = completed_relation(net, new_cut);
    let old_relation = completed_relation(net, old_cut);
    if new_relation.is_empty() || old_relation.is_empty() {
        return false;
    }
    new_relation == old_relation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_adds_transitive_edges() {
        let mut m = ReachMatrix::identity(3);
        m.set(0, 1);
        m.set(1, 2);
        m.close();
        assert!(m.reaches(0, 2));
        assert!(!m.reaches(2, 0));
        let once = m.clone();
        m.close();
        assert_eq!(m, once);
    }

    /// Two concurrent branches `a` and `x` from a fork `f`.
    fn fork() -> (OccurrenceNet, Vec<NodeId>) {
        let names = ["s", "p", "q", "pa", "qx", "f", "a", "x"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut net = OccurrenceNet::new(names);
        let s = net.add_condition(LabelId(0), None);
        let f = net.add_event(LabelId(5), &[s]);
        let p = net.add_condition(LabelId(1), Some(f));
        let q = net.add_condition(LabelId(2), Some(f));
        let a = net.add_event(LabelId(6), &[p]);
        let pa = net.add_condition(LabelId(3), Some(a));
        let x = net.add_event(LabelId(7), &[q]);
        let qx = net.add_condition(LabelId(4), Some(x));
        (net, vec![pa, qx])
    }

    #[test]
    fn concurrent_branches_become_incomparable_pairs() {
        let (net, cut) = fork();
        let relation = completed_relation(&net, &cut);
        let (f, a, x) = (LabelId(5), LabelId(6), LabelId(7));
        assert!(relation.contains(f, a));
        assert!(relation.contains(f, x));
        assert!(relation.contains(a, x));
        assert!(relation.contains(x, a));
        assert!(!relation.contains(a, f));
        assert_eq!(relation.len(), 4);
        assert_eq!(
            relation.iter().collect::<Vec<_>>(),
            vec![(f, a), (f, x), (a, x), (x, a)]
        );
        assert_eq!(maximal_labels(&net, &cut), BTreeSet::from(["a", "x"]));
    }

    #[test]
    fn initial_cut_has_an_empty_relation() {
        let (net, _) = fork();
        let initial = net.initial_conditions().to_vec();
        assert!(completed_relation(&net, &initial).is_empty());
        assert!(!directly_follows_equivalent(&net, &initial, &initial));
        assert_eq!(maximal_labels(&net, &initial), BTreeSet::from(["s"]));
    }

    #[test]
    fn equal_histories_are_directly_follows_equivalent() {
        let (net, cut) = fork();
        assert!(directly_follows_equivalent(&net, &cut, &cut));
    }
}
