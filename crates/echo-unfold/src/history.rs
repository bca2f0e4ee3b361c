// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Backward traversals over the causal past of events and conditions.
//!
//! All walks use an explicit stack (or queue) and a visited set keyed by
//! [`NodeId`]; a node is marked when it is first queued so it is never queued
//! twice. Work is linear in the size of the causal past.
use std::collections::{BTreeSet, VecDeque};

use rustc_hash::FxHashSet;

use crate::ident::{LabelId, NodeId};
use crate::net::SilentTransitions;
use crate::occurrence::OccurrenceNet;

/// Local configuration of `event`: every event that causally precedes it,
/// including `event` itself.
///
/// Returned in ascending id order.
pub fn local_configuration(net: &OccurrenceNet, event: NodeId) -> BTreeSet<NodeId> {
    debug_assert!(net.is_event(event), "local configuration of a condition");
    let mut events = BTreeSet::new();
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut stack = vec![event];
    seen.insert(event);
    while let Some(current) = stack.pop() {
        if net.is_event(current) {
            events.insert(current);
        }
        for &p in net.pre(current) {
            if seen.insert(p) {
                stack.push(p);
            }
        }
    }
    events
}

/// Full causal past of `node` (events and conditions), including `node`.
pub fn predecessors(net: &OccurrenceNet, node: NodeId) -> FxHashSet<NodeId> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut stack = vec![node];
    seen.insert(node);
    while let Some(current) = stack.pop() {
        for &p in net.pre(current) {
            if seen.insert(p) {
                stack.push(p);
            }
        }
    }
    seen
}

/// Returns `true` when `b` is a strict causal predecessor of `a`.
///
/// Breadth-first over `pre`, starting from the immediate predecessors of `a`,
/// so a node is never its own predecessor.
pub fn is_causal_predecessor(net: &OccurrenceNet, a: NodeId, b: NodeId) -> bool {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut todo: VecDeque<NodeId> = VecDeque::new();
    for &p in net.pre(a) {
        if seen.insert(p) {
            todo.push_back(p);
        }
    }
    while let Some(current) = todo.pop_front() {
        if current == b {
            return true;
        }
        for &p in net.pre(current) {
            if seen.insert(p) {
                todo.push_back(p);
            }
        }
    }
    false
}

/// Widened directly-follows pairs of the local configuration of `event`.
///
/// Two kinds of pairs are emitted, in this order and without duplicates:
///
/// 1. While walking back from `event`, every condition with a generating event
///    `g` yields `(g, target)`, where `target` starts as `event` and then
///    becomes `g`. This threads a single best-effort causal chain through the
///    past; siblings reached later attach to whatever event was crossed last.
/// 2. For every two distinct events `n`, `n1` of the configuration that are not
///    causally related in either direction, `(n, n1)` is emitted as well.
///    Concurrent events therefore "directly follow" each other both ways.
///
/// The second kind deliberately widens the classic directly-follows notion so
/// that equality of these relations also implies equal concurrency.
pub fn local_directly_follows(net: &OccurrenceNet, event: NodeId) -> Vec<(NodeId, NodeId)> {
    let mut pairs = Vec::new();
    let mut emitted: FxHashSet<(NodeId, NodeId)> = FxHashSet::default();
    let mut push = |pair: (NodeId, NodeId), pairs: &mut Vec<(NodeId, NodeId)>| {
        if emitted.insert(pair) {
            pairs.push(pair);
        }
    };

    let mut events = BTreeSet::new();
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut stack = vec![event];
    seen.insert(event);
    let mut target = event;
    while let Some(current) = stack.pop() {
        if net.is_event(current) {
            events.insert(current);
        } else if let Some(generator) = net.producer(current) {
            push((generator, target), &mut pairs);
            target = generator;
        }
        for &p in net.pre(current) {
            if seen.insert(p) {
                stack.push(p);
            }
        }
    }

    for &n in &events {
        for &n1 in &events {
            if n != n1
                && !is_causal_predecessor(net, n, n1)
                && !is_causal_predecessor(net, n1, n)
            {
                push((n, n1), &mut pairs);
            }
        }
    }
    pairs
}

/// Labels of the non-silent events in `configuration`.
pub fn visible_transitions<'a>(
    net: &OccurrenceNet,
    silent: &SilentTransitions,
    configuration: impl IntoIterator<Item = &'a NodeId>,
) -> BTreeSet<LabelId> {
    configuration
        .into_iter()
        .filter(|&&e| net.is_event(e) && !silent.is_silent(net, e))
        .map(|&e| net.label(e))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `c0 -> a -> c1 -> b -> c2` plus `c3 -> x -> c4` running alongside.
    fn chain_with_sibling() -> (OccurrenceNet, [NodeId; 3]) {
        let names = ["p0", "p1", "p2", "q0", "q1", "a", "b", "x"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut net = OccurrenceNet::new(names);
        let c0 = net.add_condition(LabelId(0), None);
        let c3 = net.add_condition(LabelId(3), None);
        let a = net.add_event(LabelId(5), &[c0]);
        let c1 = net.add_condition(LabelId(1), Some(a));
        let x = net.add_event(LabelId(7), &[c3]);
        let _c4 = net.add_condition(LabelId(4), Some(x));
        let b = net.add_event(LabelId(6), &[c1]);
        let _c2 = net.add_condition(LabelId(2), Some(b));
        (net, [a, b, x])
    }

    #[test]
    fn local_configuration_is_the_causal_past() {
        let (net, [a, b, x]) = chain_with_sibling();
        assert_eq!(local_configuration(&net, b), BTreeSet::from([a, b]));
        assert_eq!(local_configuration(&net, a), BTreeSet::from([a]));
        assert_eq!(local_configuration(&net, x), BTreeSet::from([x]));
    }

    #[test]
    fn causal_predecessor_is_strict() {
        let (net, [a, b, x]) = chain_with_sibling();
        assert!(is_causal_predecessor(&net, b, a));
        assert!(!is_causal_predecessor(&net, a, b));
        assert!(!is_causal_predecessor(&net, b, b));
        assert!(!is_causal_predecessor(&net, b, x));
    }

    #[test]
    fn directly_follows_threads_the_chain() {
        let (net, [a, b, _]) = chain_with_sibling();
        assert_eq!(local_directly_follows(&net, b), vec![(a, b)]);
        assert!(local_directly_follows(&net, a).is_empty());
    }

    #[test]
    fn directly_follows_widening_records_concurrent_events_both_ways() {
        // join: a and x are concurrent, j consumes both outputs.
        let names = ["p0", "p1", "q0", "q1", "r", "a", "x", "j"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut net = OccurrenceNet::new(names);
        let c0 = net.add_condition(LabelId(0), None);
        let d0 = net.add_condition(LabelId(2), None);
        let a = net.add_event(LabelId(5), &[c0]);
        let c1 = net.add_condition(LabelId(1), Some(a));
        let x = net.add_event(LabelId(6), &[d0]);
        let d1 = net.add_condition(LabelId(3), Some(x));
        let j = net.add_event(LabelId(7), &[c1, d1]);
        let _r = net.add_condition(LabelId(4), Some(j));

        let pairs = local_directly_follows(&net, j);
        // d1 is popped first (last pushed), then c1 attaches to x.
        assert_eq!(pairs[0], (x, j));
        assert_eq!(pairs[1], (a, x));
        assert!(pairs.contains(&(a, x)));
        assert!(pairs.contains(&(x, a)));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn visible_transitions_skip_silent_events() {
        let (net, [a, b, x]) = chain_with_sibling();
        let silent: SilentTransitions = ["b"].into_iter().collect();
        let labels = visible_transitions(&net, &silent, &[a, b, x]);
        assert_eq!(labels, BTreeSet::from([LabelId(5), LabelId(7)]));
    }
}
