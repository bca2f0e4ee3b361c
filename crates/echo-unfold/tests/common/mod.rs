// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use echo_unfold::{
    unfold, EquivalenceMode, Hash, LabelId, NodeId, OccurrenceNet, PetriNet, Prefix, PrefixView,
    SilentTransitions, UnfoldOptions,
};

/// `p0 -a-> p1 -b-> p0`, one token on `p0`.
pub fn ping_pong() -> PetriNet {
    let mut net = PetriNet::new();
    let p0 = net.add_place("p0", 1).unwrap();
    let p1 = net.add_place("p1", 0).unwrap();
    net.add_transition("a", &[p0], &[p1]).unwrap();
    net.add_transition("b", &[p1], &[p0]).unwrap();
    net
}

/// Two processes `x` and `y` sharing a mutex `m`; each fires once.
pub fn mutex() -> PetriNet {
    let mut net = PetriNet::new();
    let px = net.add_place("px", 1).unwrap();
    let py = net.add_place("py", 1).unwrap();
    let m = net.add_place("m", 1).unwrap();
    let qx = net.add_place("qx", 0).unwrap();
    let qy = net.add_place("qy", 0).unwrap();
    net.add_transition("x", &[px, m], &[qx, m]).unwrap();
    net.add_transition("y", &[py, m], &[qy, m]).unwrap();
    net
}

/// `p0 -a-> p1 -tau 1-> p0`, one token on `p0`.
pub fn tau_loop() -> PetriNet {
    let mut net = PetriNet::new();
    let p0 = net.add_place("p0", 1).unwrap();
    let p1 = net.add_place("p1", 0).unwrap();
    net.add_transition("a", &[p0], &[p1]).unwrap();
    net.add_transition("tau 1", &[p1], &[p0]).unwrap();
    net
}

/// A free choice between `a` and `b`, both leading to `q`.
pub fn choice() -> PetriNet {
    let mut net = PetriNet::new();
    let p = net.add_place("p", 1).unwrap();
    let q = net.add_place("q", 0).unwrap();
    net.add_transition("a", &[p], &[q]).unwrap();
    net.add_transition("b", &[p], &[q]).unwrap();
    net
}

/// Two branches from `s` into the dead end `p9`: `a b` on one side and
/// `b a a` on the other, reusing the names `a` and `b` across transitions.
pub fn renamed_branches() -> PetriNet {
    let mut net = PetriNet::new();
    let s = net.add_place("s", 1).unwrap();
    let p1 = net.add_place("p1", 0).unwrap();
    let p9 = net.add_place("p9", 0).unwrap();
    let q1 = net.add_place("q1", 0).unwrap();
    let q2 = net.add_place("q2", 0).unwrap();
    net.add_transition("a", &[s], &[p1]).unwrap();
    net.add_transition("b", &[p1], &[p9]).unwrap();
    net.add_transition("b", &[s], &[q1]).unwrap();
    net.add_transition("a", &[q1], &[q2]).unwrap();
    net.add_transition("a", &[q2], &[p9]).unwrap();
    net
}

pub fn options(mode: EquivalenceMode) -> UnfoldOptions {
    UnfoldOptions {
        mode,
        ..UnfoldOptions::default()
    }
}

/// Unfolds `net` with silent transitions detected by name.
pub fn run(net: &PetriNet, mode: EquivalenceMode) -> Prefix {
    unfold(net, SilentTransitions::detect(net), options(mode)).unwrap()
}

/// The unique event labelled `name` whose prime configuration has `size`
/// events.
pub fn event(prefix: &Prefix, name: &str, size: usize) -> NodeId {
    let found: Vec<NodeId> = prefix
        .net()
        .events()
        .filter(|&e| prefix.net().proper_name(e) == name)
        .filter(|&e| prefix.record(e).map(|r| r.size()) == Some(size))
        .collect();
    assert_eq!(found.len(), 1, "expected one {name} of size {size}, got {found:?}");
    found[0]
}

pub fn cut(prefix: &Prefix, event: NodeId) -> Vec<NodeId> {
    prefix.record(event).unwrap().cut.clone()
}

/// View over a finished prefix with selected answers replaced.
pub struct Overlay<'a> {
    pub inner: &'a Prefix,
    pub sizes: BTreeMap<NodeId, Option<usize>>,
    pub fresh: BTreeSet<NodeId>,
}

impl<'a> Overlay<'a> {
    pub fn new(inner: &'a Prefix) -> Self {
        Self {
            inner,
            sizes: BTreeMap::new(),
            fresh: BTreeSet::new(),
        }
    }

    pub fn with_size(mut self, event: NodeId, size: Option<usize>) -> Self {
        self.sizes.insert(event, size);
        self
    }

    pub fn with_fresh(mut self, event: NodeId) -> Self {
        self.fresh.insert(event);
        self
    }
}

impl PrefixView for Overlay<'_> {
    fn net(&self) -> &OccurrenceNet {
        self.inner.net()
    }

    fn prime_configuration_size(&self, event: NodeId) -> Option<usize> {
        self.sizes
            .get(&event)
            .copied()
            .unwrap_or_else(|| self.inner.prime_configuration_size(event))
    }

    fn prime_cut_hash(&self, event: NodeId) -> Option<Hash> {
        self.inner.prime_cut_hash(event)
    }

    fn prime_configuration_key(&self, event: NodeId) -> Option<&[LabelId]> {
        self.inner.prime_configuration_key(event)
    }

    fn prime_cut(&self, event: NodeId) -> Option<&[NodeId]> {
        self.inner.prime_cut(event)
    }

    fn equivalent_cuts(&self, new_cut: &[NodeId], old_cut: &[NodeId]) -> bool {
        self.inner.equivalent_cuts(new_cut, old_cut)
    }

    fn is_fresh(&self, event: NodeId) -> bool {
        self.fresh.contains(&event) || self.inner.is_fresh(event)
    }
}
