// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference unfolding driver.
//!
//! Grows a finite complete prefix of a [`PetriNet`]'s branching process and
//! consults the [`CutoffOracle`] once per added event. The driver owns every
//! piece of mutable state: node identities, per-event bookkeeping, the
//! co-relation, and the [`StatusMap`].
//!
//! Extensions are processed in ascending `(size, label key, discovery order)`.
//! All extensions of the current minimal size form one batch; they are added
//! first and decided afterwards, so events of the batch are *fresh* while the
//! oracle runs and equal-size ordering repairs can be requested.
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use crate::classify::{classify, Classification};
use crate::ident::{marking_digest, Hash, LabelId, NodeId};
use crate::net::{
    consumers, NetDescription, PetriNet, PlaceIndex, PlaceSpec, SilentTransitions,
    TransitionIndex, TransitionSpec,
};
use crate::occurrence::OccurrenceNet;
use crate::oracle::{CutoffOracle, EquivalenceMode, PrefixView};
use crate::status::StatusMap;

/// Driver options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UnfoldOptions {
    /// Equivalence restriction applied to cut-off correspondences.
    pub mode: EquivalenceMode,
    /// Break equal-size ties by the lexicographic label key.
    pub lexicographic: bool,
    /// Upper bound on the number of events; `None` is unbounded.
    pub max_events: Option<usize>,
}

/// Errors raised while unfolding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnfoldError {
    /// The occurrence net would exceed the `u32` node-id space.
    #[error("occurrence net would exceed {0} nodes")]
    ArenaOverflow(usize),
}

/// Bookkeeping of one event's prime configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    /// Events of the prime configuration, ascending, including the event.
    pub configuration: Vec<NodeId>,
    /// Transition labels of the configuration, ascending.
    pub key: Vec<LabelId>,
    /// Cut reached by the configuration, ascending.
    pub cut: Vec<NodeId>,
    /// Digest of the reached marking.
    pub hash: Hash,
}

impl EventRecord {
    /// Size of the prime configuration.
    #[must_use]
    pub fn size(&self) -> usize {
        self.configuration.len()
    }
}

/// A committed cut-off together with its classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CutoffPair {
    /// The cut-off event.
    pub cut_off: NodeId,
    /// The event it corresponds to.
    pub corresponding: NodeId,
    /// Shape, link and containment of the pair.
    pub classification: Classification,
}

/// Finite prefix produced by [`Unfolder::run`].
#[derive(Clone, Debug)]
pub struct Prefix {
    net: OccurrenceNet,
    silent: SilentTransitions,
    mode: EquivalenceMode,
    status: StatusMap,
    records: BTreeMap<NodeId, EventRecord>,
    corresponding: BTreeMap<NodeId, NodeId>,
    condition_pairs: BTreeMap<NodeId, NodeId>,
    fresh: FxHashSet<NodeId>,
    complete: bool,
}

impl Prefix {
    fn new(names: Vec<String>, silent: SilentTransitions, mode: EquivalenceMode) -> Self {
        Self {
            net: OccurrenceNet::new(names),
            silent,
            mode,
            status: StatusMap::new(),
            records: BTreeMap::new(),
            corresponding: BTreeMap::new(),
            condition_pairs: BTreeMap::new(),
            fresh: FxHashSet::default(),
            complete: false,
        }
    }

    /// The occurrence net.
    #[must_use]
    pub fn net(&self) -> &OccurrenceNet {
        &self.net
    }

    /// Status flags of every node.
    #[must_use]
    pub fn status(&self) -> &StatusMap {
        &self.status
    }

    /// Silent transitions used while unfolding.
    #[must_use]
    pub fn silent(&self) -> &SilentTransitions {
        &self.silent
    }

    /// Equivalence mode used while unfolding.
    #[must_use]
    pub fn mode(&self) -> EquivalenceMode {
        self.mode
    }

    /// `false` when the event budget ran out before every extension was
    /// processed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Bookkeeping of `event`.
    #[must_use]
    pub fn record(&self, event: NodeId) -> Option<&EventRecord> {
        self.records.get(&event)
    }

    /// Corresponding event of the cut-off `event`.
    #[must_use]
    pub fn corresponding(&self, event: NodeId) -> Option<NodeId> {
        self.corresponding.get(&event).copied()
    }

    /// Condition of a corresponding cut paired with the cut-off output
    /// `condition`.
    #[must_use]
    pub fn paired_condition(&self, condition: NodeId) -> Option<NodeId> {
        self.condition_pairs.get(&condition).copied()
    }

    /// All condition pairs in ascending order of the cut-off output.
    pub fn condition_pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.condition_pairs.iter().map(|(a, b)| (*a, *b))
    }

    /// Cut-off events in ascending id order.
    #[must_use]
    pub fn cut_offs(&self) -> Vec<NodeId> {
        self.corresponding.keys().copied().collect()
    }

    /// Classifies every committed cut-off pair.
    #[must_use]
    pub fn classify_all(&self) -> Vec<CutoffPair> {
        self.corresponding
            .iter()
            .filter_map(|(&cut_off, &corresponding)| {
                let own = self.records.get(&cut_off)?;
                let other = self.records.get(&corresponding)?;
                Some(CutoffPair {
                    cut_off,
                    corresponding,
                    classification: classify(
                        &self.net,
                        &self.silent,
                        cut_off,
                        corresponding,
                        &own.cut,
                        &other.cut,
                    ),
                })
            })
            .collect()
    }

    /// The prefix as a place/transition net.
    ///
    /// Conditions become places named `place@nID`, initial conditions hold one
    /// token, and events become transitions carrying their transition names.
    #[must_use]
    pub fn to_description(&self) -> NetDescription {
        let place_name = |c: NodeId| format!("{}@{c}", self.net.proper_name(c));
        let initial = self.net.initial_conditions();
        NetDescription {
            places: self
                .net
                .conditions()
                .map(|c| PlaceSpec {
                    name: place_name(c),
                    tokens: u32::from(initial.contains(&c)),
                })
                .collect(),
            transitions: self
                .net
                .events()
                .map(|e| TransitionSpec {
                    name: self.net.proper_name(e).to_owned(),
                    inputs: self.net.pre(e).iter().map(|&c| place_name(c)).collect(),
                    outputs: self.net.post(e).iter().map(|&c| place_name(c)).collect(),
                })
                .collect(),
        }
    }

    fn commit(&mut self, event: NodeId, corresponding: NodeId) {
        self.status.mark_cut_off(event);
        self.corresponding.insert(event, corresponding);
        let mut available = self
            .records
            .get(&corresponding)
            .map(|r| r.cut.clone())
            .unwrap_or_default();
        for &condition in self.net.post(event) {
            self.status.mark_cut_off(condition);
            let label = self.net.label(condition);
            if let Some(pos) = available.iter().position(|&c| self.net.label(c) == label) {
                self.condition_pairs.insert(condition, available.remove(pos));
            }
        }
        debug!(
            %event,
            %corresponding,
            transition = self.net.proper_name(event),
            "cut-off"
        );
    }

    fn sorted_labels(&self, cut: &[NodeId]) -> Vec<LabelId> {
        let mut labels: Vec<LabelId> = cut.iter().map(|&c| self.net.label(c)).collect();
        labels.sort_unstable();
        labels
    }
}

impl PrefixView for Prefix {
    fn net(&self) -> &OccurrenceNet {
        &self.net
    }

    fn prime_configuration_size(&self, event: NodeId) -> Option<usize> {
        self.records.get(&event).map(EventRecord::size)
    }

    fn prime_cut_hash(&self, event: NodeId) -> Option<Hash> {
        self.records.get(&event).map(|r| r.hash)
    }

    fn prime_configuration_key(&self, event: NodeId) -> Option<&[LabelId]> {
        self.records.get(&event).map(|r| r.key.as_slice())
    }

    fn prime_cut(&self, event: NodeId) -> Option<&[NodeId]> {
        self.records.get(&event).map(|r| r.cut.as_slice())
    }

    /// Both cuts carry the same multiset of place labels.
    fn equivalent_cuts(&self, new_cut: &[NodeId], old_cut: &[NodeId]) -> bool {
        self.sorted_labels(new_cut) == self.sorted_labels(old_cut)
    }

    fn is_fresh(&self, event: NodeId) -> bool {
        self.fresh.contains(&event)
    }
}

/// Possible extension waiting to be added.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Extension {
    size: usize,
    key: Vec<LabelId>,
    seq: u64,
    transition: TransitionIndex,
    preset: Vec<NodeId>,
    past: Vec<NodeId>,
}

/// Unfolding driver over a borrowed [`PetriNet`].
#[derive(Debug)]
pub struct Unfolder<'a> {
    source: &'a PetriNet,
    oracle: CutoffOracle,
    max_events: Option<usize>,
    consumers: BTreeMap<PlaceIndex, Vec<TransitionIndex>>,
    prefix: Prefix,
    by_place: Vec<Vec<NodeId>>,
    co: BTreeMap<NodeId, BTreeSet<NodeId>>,
    pending: BTreeSet<Extension>,
    queued: FxHashSet<(TransitionIndex, Vec<NodeId>)>,
    seq: u64,
}

impl<'a> Unfolder<'a> {
    /// Creates a driver for `source`.
    #[must_use]
    pub fn new(source: &'a PetriNet, silent: SilentTransitions, options: UnfoldOptions) -> Self {
        Self {
            source,
            oracle: CutoffOracle::new(options.mode, options.lexicographic, silent.clone()),
            max_events: options.max_events,
            consumers: consumers(source),
            prefix: Prefix::new(source.label_names(), silent, options.mode),
            by_place: vec![Vec::new(); source.places().len()],
            co: BTreeMap::new(),
            pending: BTreeSet::new(),
            queued: FxHashSet::default(),
            seq: 0,
        }
    }

    /// Unfolds the net until no extension is left or the event budget is spent.
    #[instrument(
        skip(self),
        fields(mode = %self.oracle.mode(), lexicographic = self.oracle.lexicographic())
    )]
    pub fn run(mut self) -> Result<Prefix, UnfoldError> {
        let initial = self.seed()?;
        self.discover(&initial);

        let mut exhausted = false;
        while let Some(size) = self.pending.first().map(|x| x.size) {
            let mut batch = Vec::new();
            while self.pending.first().is_some_and(|x| x.size == size) {
                if self.budget_spent() {
                    exhausted = true;
                    break;
                }
                if let Some(extension) = self.pending.pop_first() {
                    batch.push(self.fire(extension)?);
                }
            }
            trace!(size, events = batch.len(), "deciding batch");
            self.decide(&batch);
            self.prefix.fresh.clear();
            if exhausted {
                break;
            }
            for event in batch {
                if !self.prefix.status.is_cut_off(event) {
                    let outputs = self.prefix.net.post(event).to_vec();
                    self.discover(&outputs);
                }
            }
        }

        self.prefix.complete = !exhausted;
        if exhausted {
            warn!(
                events = self.prefix.net.event_count(),
                pending = self.pending.len(),
                "event budget exhausted; prefix is incomplete"
            );
        }
        debug!(
            events = self.prefix.net.event_count(),
            conditions = self.prefix.net.len() - self.prefix.net.event_count(),
            cut_offs = self.prefix.corresponding.len(),
            "unfolding finished"
        );
        Ok(self.prefix)
    }

    fn budget_spent(&self) -> bool {
        self.max_events
            .is_some_and(|max| self.prefix.net.event_count() >= max)
    }

    fn reserve(&self, extra: usize) -> Result<(), UnfoldError> {
        let total = self.prefix.net.len() + extra;
        if u32::try_from(total).is_err() {
            return Err(UnfoldError::ArenaOverflow(total));
        }
        Ok(())
    }

    fn seed(&mut self) -> Result<Vec<NodeId>, UnfoldError> {
        let mut initial = Vec::new();
        for (index, place) in self.source.places().iter().enumerate() {
            let label = self.source.place_label(PlaceIndex(index));
            for _ in 0..place.tokens {
                self.reserve(1)?;
                initial.push(self.prefix.net.add_condition(label, None));
            }
        }
        for &c in &initial {
            let others = initial.iter().copied().filter(|&o| o != c).collect();
            self.co.insert(c, others);
        }
        Ok(initial)
    }

    fn concurrent(&self, a: NodeId, b: NodeId) -> bool {
        self.co.get(&a).is_some_and(|set| set.contains(&b))
    }

    /// Registers `conditions` and queues every extension using at least one of
    /// them.
    fn discover(&mut self, conditions: &[NodeId]) {
        for &c in conditions {
            self.by_place[self.prefix.net.label(c).index()].push(c);
        }
        let mut found = Vec::new();
        for &c in conditions {
            let place = PlaceIndex(self.prefix.net.label(c).index());
            let Some(transitions) = self.consumers.get(&place) else {
                continue;
            };
            for &t in transitions {
                let preset = &self.source.transitions()[t.0].preset;
                let mut chosen = Vec::with_capacity(preset.len());
                let mut presets = Vec::new();
                self.choose(preset, (place, c), &mut chosen, &mut presets);
                found.extend(presets.into_iter().map(|p| (t, p)));
            }
        }
        for (t, preset) in found {
            self.enqueue(t, preset);
        }
    }

    fn choose(
        &self,
        places: &[PlaceIndex],
        fixed: (PlaceIndex, NodeId),
        chosen: &mut Vec<NodeId>,
        out: &mut Vec<Vec<NodeId>>,
    ) {
        let Some((&place, rest)) = places.split_first() else {
            out.push(chosen.clone());
            return;
        };
        let options = if place == fixed.0 {
            std::slice::from_ref(&fixed.1)
        } else {
            self.by_place[place.0].as_slice()
        };
        for &c in options {
            if chosen.iter().all(|&d| self.concurrent(c, d)) {
                chosen.push(c);
                self.choose(rest, fixed, chosen, out);
                chosen.pop();
            }
        }
    }

    fn enqueue(&mut self, transition: TransitionIndex, mut preset: Vec<NodeId>) {
        preset.sort_unstable();
        if !self.queued.insert((transition, preset.clone())) {
            return;
        }
        let mut past = BTreeSet::new();
        for &c in &preset {
            if let Some(record) = self
                .prefix
                .net
                .producer(c)
                .and_then(|p| self.prefix.records.get(&p))
            {
                past.extend(record.configuration.iter().copied());
            }
        }
        let mut key: Vec<LabelId> = past.iter().map(|&e| self.prefix.net.label(e)).collect();
        key.push(self.source.transition_label(transition));
        key.sort_unstable();
        let extension = Extension {
            size: past.len() + 1,
            key,
            seq: self.seq,
            transition,
            preset,
            past: past.into_iter().collect(),
        };
        self.seq += 1;
        trace!(
            transition = %self.source.transitions()[transition.0].name,
            size = extension.size,
            "queued extension"
        );
        self.pending.insert(extension);
    }

    fn fire(&mut self, extension: Extension) -> Result<NodeId, UnfoldError> {
        let source = self.source;
        let transition = &source.transitions()[extension.transition.0];
        self.reserve(1 + transition.postset.len())?;
        let net = &mut self.prefix.net;
        let event = net.add_event(
            source.transition_label(extension.transition),
            &extension.preset,
        );
        let outputs: Vec<NodeId> = transition
            .postset
            .iter()
            .map(|&p| net.add_condition(source.place_label(p), Some(event)))
            .collect();

        let mut common: Option<BTreeSet<NodeId>> = None;
        for c in &extension.preset {
            let set = self.co.get(c).cloned().unwrap_or_default();
            common = Some(match common {
                Some(acc) => acc.intersection(&set).copied().collect(),
                None => set,
            });
        }
        let common = common.unwrap_or_default();
        for &d in &common {
            if let Some(set) = self.co.get_mut(&d) {
                set.extend(outputs.iter().copied());
            }
        }
        for &c in &outputs {
            let mut set = common.clone();
            set.extend(outputs.iter().copied().filter(|&o| o != c));
            self.co.insert(c, set);
        }

        let mut configuration = extension.past;
        configuration.push(event);
        let cut = self.reached_cut(&configuration);
        let hash = marking_digest(cut.iter().map(|&c| self.prefix.net.label(c)));
        self.prefix.records.insert(
            event,
            EventRecord {
                configuration,
                key: extension.key,
                cut,
                hash,
            },
        );
        self.prefix.fresh.insert(event);
        Ok(event)
    }

    /// Initial conditions plus every output of `configuration`, minus every
    /// input of it.
    fn reached_cut(&self, configuration: &[NodeId]) -> Vec<NodeId> {
        let net = &self.prefix.net;
        let mut cut: BTreeSet<NodeId> = net.initial_conditions().iter().copied().collect();
        for &e in configuration {
            cut.extend(net.post(e).iter().copied());
        }
        for &e in configuration {
            for c in net.pre(e) {
                cut.remove(c);
            }
        }
        cut.into_iter().collect()
    }

    /// Runs the oracle over `batch`, draining re-evaluation requests first in
    /// first out. Each event is re-evaluated at most once per batch.
    fn decide(&mut self, batch: &[NodeId]) {
        let mut rechecked: FxHashSet<NodeId> = FxHashSet::default();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        for &event in batch {
            queue.push_back(event);
            while let Some(next) = queue.pop_front() {
                if self.prefix.status.is_cut_off(next) {
                    continue;
                }
                let decision = self.oracle.is_cut_off_event(&self.prefix, next);
                for &again in &decision.recheck {
                    if rechecked.insert(again) {
                        trace!(%next, event = %again, "re-evaluation requested");
                        queue.push_back(again);
                    }
                }
                if let Some(corresponding) = decision.corresponding {
                    self.prefix.commit(next, corresponding);
                }
            }
        }
    }
}

/// Unfolds `net` with the given silent transitions and options.
pub fn unfold(
    net: &PetriNet,
    silent: SilentTransitions,
    options: UnfoldOptions,
) -> Result<Prefix, UnfoldError> {
    Unfolder::new(net, silent, options).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping_pong() -> PetriNet {
        let mut net = PetriNet::new();
        let p0 = net.add_place("p0", 1).unwrap();
        let p1 = net.add_place("p1", 0).unwrap();
        net.add_transition("a", &[p0], &[p1]).unwrap();
        net.add_transition("b", &[p1], &[p0]).unwrap();
        net
    }

    #[test]
    fn records_track_prime_configurations() {
        let net = ping_pong();
        let prefix = unfold(&net, SilentTransitions::none(), UnfoldOptions::default()).unwrap();
        let events: Vec<NodeId> = prefix.net().events().collect();
        assert_eq!(events.len(), 3);
        let sizes: Vec<usize> = events
            .iter()
            .map(|&e| prefix.record(e).unwrap().size())
            .collect();
        assert_eq!(sizes, vec![1, 2, 3]);
        assert!(prefix.is_complete());
    }

    #[test]
    fn budget_stops_the_driver() {
        let net = ping_pong();
        let options = UnfoldOptions {
            max_events: Some(2),
            ..UnfoldOptions::default()
        };
        let prefix = unfold(&net, SilentTransitions::none(), options).unwrap();
        assert_eq!(prefix.net().event_count(), 2);
        assert!(!prefix.is_complete());
        assert!(prefix.cut_offs().is_empty());
    }

    #[test]
    fn cut_off_outputs_are_paired_with_the_corresponding_cut() {
        let net = ping_pong();
        let prefix = unfold(&net, SilentTransitions::none(), UnfoldOptions::default()).unwrap();
        let cut_offs = prefix.cut_offs();
        assert_eq!(cut_offs.len(), 1);
        let cut_off = cut_offs[0];
        let corresponding = prefix.corresponding(cut_off).unwrap();
        let output = prefix.net().post(cut_off)[0];
        assert_eq!(
            prefix.paired_condition(output),
            Some(prefix.net().post(corresponding)[0])
        );
        assert!(prefix.status().is_cut_off(output));
        assert_eq!(
            prefix.condition_pairs().collect::<Vec<_>>(),
            vec![(output, prefix.net().post(corresponding)[0])]
        );
    }

    #[test]
    fn exported_prefix_is_a_valid_net() {
        let net = ping_pong();
        let prefix = unfold(&net, SilentTransitions::none(), UnfoldOptions::default()).unwrap();
        let description = prefix.to_description();
        assert_eq!(description.places.len(), 4);
        assert_eq!(description.places[0].name, "p0@n0");
        assert_eq!(description.places[0].tokens, 1);
        let names: Vec<&str> = description
            .transitions
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "a"]);
        assert!(PetriNet::from_description(&description).is_ok());
    }
}
