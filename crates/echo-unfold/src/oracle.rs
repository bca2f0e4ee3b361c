// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cut-off decision engine.
//!
//! Given an event just added by the unfolding driver and the cut its prime
//! configuration reaches, the oracle looks for an earlier, smaller event whose
//! reached state is equivalent. Candidates are screened by cheap filters first
//! (bookkeeping present, configuration size, marking digest, cut length, size
//! tie-break) and only then by the selected [`EquivalenceMode`] predicate and
//! the driver's structural cut equivalence.
//!
//! The oracle never mutates the prefix. A positive verdict and any
//! re-evaluation requests are returned in a [`CutoffDecision`] for the driver to
//! commit.
use std::fmt;
use std::str::FromStr;

use tracing::trace;

use crate::closure::directly_follows_equivalent;
use crate::history::{local_configuration, visible_transitions};
use crate::ident::{Hash, LabelId, NodeId};
use crate::net::SilentTransitions;
use crate::occurrence::OccurrenceNet;

/// Equivalence notion used to restrict cut-off correspondences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum EquivalenceMode {
    /// Adequate-order equivalence: equal reached markings suffice.
    #[default]
    Esparza,
    /// Additionally require equal sets of visible transitions in both local
    /// configurations.
    #[cfg_attr(feature = "serde", serde(rename = "equal-preds"))]
    EqualPredecessors,
    /// Additionally require equal completed directly-follows relations of both
    /// reached cuts.
    #[cfg_attr(feature = "serde", serde(rename = "equal-dfs"))]
    EqualDirectlyFollows,
}

impl EquivalenceMode {
    /// Canonical command-line spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Esparza => "esparza",
            Self::EqualPredecessors => "equal-preds",
            Self::EqualDirectlyFollows => "equal-dfs",
        }
    }
}

impl fmt::Display for EquivalenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`EquivalenceMode`] name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown equivalence mode {0:?} (expected esparza, equal-preds or equal-dfs)")]
pub struct ParseModeError(pub String);

impl FromStr for EquivalenceMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "esparza" => Ok(Self::Esparza),
            "equal-preds" | "equal-predecessors" => Ok(Self::EqualPredecessors),
            "equal-dfs" | "equal-directly-follows" => Ok(Self::EqualDirectlyFollows),
            _ => Err(ParseModeError(s.to_owned())),
        }
    }
}

/// Read-only view of the prefix under construction, supplied by the driver.
///
/// Every lookup returns `None` when the driver has no complete bookkeeping for
/// the event yet; such events are never used as correspondences.
pub trait PrefixView {
    /// The occurrence net grown so far.
    fn net(&self) -> &OccurrenceNet;

    /// Size of the prime configuration of `event`.
    fn prime_configuration_size(&self, event: NodeId) -> Option<usize>;

    /// Digest of the marking reached by the prime configuration of `event`.
    fn prime_cut_hash(&self, event: NodeId) -> Option<Hash>;

    /// Canonical key of the prime configuration of `event`, ordered
    /// lexicographically.
    fn prime_configuration_key(&self, event: NodeId) -> Option<&[LabelId]>;

    /// Cut reached by the prime configuration of `event`.
    fn prime_cut(&self, event: NodeId) -> Option<&[NodeId]>;

    /// Structural cut equivalence: `true` iff both cuts provably lead to the
    /// same future behaviour.
    fn equivalent_cuts(&self, new_cut: &[NodeId], old_cut: &[NodeId]) -> bool;

    /// Returns `true` while `event` belongs to the batch currently being
    /// decided by the driver.
    fn is_fresh(&self, event: NodeId) -> bool;
}

/// Why a candidate was not accepted as the corresponding event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// The candidate is the new event itself.
    SameEvent,
    /// The candidate has no complete prime-configuration bookkeeping.
    UnknownBookkeeping,
    /// The candidate's prime configuration is larger.
    LargerConfiguration,
    /// The reached markings hash differently.
    HashMismatch,
    /// The reached cuts have different cardinalities.
    CutLengthMismatch,
    /// Equal sizes outside the lexicographic strategy.
    EqualSize,
    /// Equal sizes and the candidate is not lexicographically smaller.
    NotLexicographicallySmaller,
    /// The equivalence-mode predicate failed.
    ModePredicate,
    /// The driver's structural cut equivalence failed.
    InequivalentCuts,
}

/// Verdict of one oracle invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CutoffDecision {
    /// The event that makes the new event redundant, if any.
    pub corresponding: Option<NodeId>,
    /// Fresh events the driver must re-evaluate because they turned out to be
    /// ordered before the new event.
    pub recheck: Vec<NodeId>,
}

impl CutoffDecision {
    /// Returns `true` when the new event is a cut-off.
    #[must_use]
    pub fn is_cut_off(&self) -> bool {
        self.corresponding.is_some()
    }
}

/// Pure decision function over a [`PrefixView`].
#[derive(Clone, Debug, Default)]
pub struct CutoffOracle {
    mode: EquivalenceMode,
    lexicographic: bool,
    silent: SilentTransitions,
}

impl CutoffOracle {
    /// Creates an oracle for `mode`; `lexicographic` enables the
    /// size-lexicographic tie-break for equal-size configurations.
    #[must_use]
    pub fn new(mode: EquivalenceMode, lexicographic: bool, silent: SilentTransitions) -> Self {
        Self {
            mode,
            lexicographic,
            silent,
        }
    }

    /// Active equivalence mode.
    #[must_use]
    pub fn mode(&self) -> EquivalenceMode {
        self.mode
    }

    /// Whether equal-size ties are broken lexicographically.
    #[must_use]
    pub fn lexicographic(&self) -> bool {
        self.lexicographic
    }

    /// Silent transitions ignored by label comparisons.
    #[must_use]
    pub fn silent(&self) -> &SilentTransitions {
        &self.silent
    }

    /// Decides whether `event` is a cut-off, comparing it against every event
    /// of the prefix.
    pub fn is_cut_off_event<V: PrefixView + ?Sized>(
        &self,
        view: &V,
        event: NodeId,
    ) -> CutoffDecision {
        let Some(new_cut) = view.prime_cut(event) else {
            trace!(%event, "no prime cut bookkeeping; not a cut-off");
            return CutoffDecision::default();
        };
        let candidates: Vec<NodeId> = view.net().events().collect();
        self.find_equivalent(view, event, new_cut, candidates)
    }

    /// Searches `candidates` for an event equivalent to `new_event`, which
    /// reaches `new_cut`. The first candidate passing every check wins.
    pub fn find_equivalent<V, I>(
        &self,
        view: &V,
        new_event: NodeId,
        new_cut: &[NodeId],
        candidates: I,
    ) -> CutoffDecision
    where
        V: PrefixView + ?Sized,
        I: IntoIterator<Item = NodeId>,
    {
        let mut decision = CutoffDecision::default();
        let (Some(new_size), Some(new_hash)) = (
            view.prime_configuration_size(new_event),
            view.prime_cut_hash(new_event),
        ) else {
            trace!(%new_event, "new event lacks bookkeeping; not a cut-off");
            return decision;
        };
        for candidate in candidates {
            let verdict = self.screen(
                view,
                new_event,
                new_cut,
                (new_size, new_hash),
                candidate,
                &mut decision.recheck,
            );
            match verdict {
                Ok(()) => {
                    decision.corresponding = Some(candidate);
                    return decision;
                }
                Err(reason) => trace!(%new_event, %candidate, ?reason, "candidate rejected"),
            }
        }
        decision
    }

    /// Runs the filter pipeline for one candidate. Equal-size candidates that
    /// lose the lexicographic comparison while still fresh are appended to
    /// `recheck`.
    fn screen<V: PrefixView + ?Sized>(
        &self,
        view: &V,
        new_event: NodeId,
        new_cut: &[NodeId],
        (new_size, new_hash): (usize, Hash),
        candidate: NodeId,
        recheck: &mut Vec<NodeId>,
    ) -> Result<(), Rejection> {
        if candidate == new_event {
            return Err(Rejection::SameEvent);
        }
        let old_size = view
            .prime_configuration_size(candidate)
            .ok_or(Rejection::UnknownBookkeeping)?;
        if new_size < old_size {
            return Err(Rejection::LargerConfiguration);
        }
        if view.prime_cut_hash(candidate) != Some(new_hash) {
            return Err(Rejection::HashMismatch);
        }
        let old_cut = view.prime_cut(candidate).ok_or(Rejection::UnknownBookkeeping)?;
        if old_cut.len() != new_cut.len() {
            return Err(Rejection::CutLengthMismatch);
        }
        if new_size == old_size {
            if !self.lexicographic {
                return Err(Rejection::EqualSize);
            }
            let smaller = match (
                view.prime_configuration_key(candidate),
                view.prime_configuration_key(new_event),
            ) {
                (Some(old_key), Some(new_key)) => old_key < new_key,
                _ => false,
            };
            if !smaller {
                // The candidate was added in the wrong order; it may itself be
                // a cut-off against the new event.
                if view.is_fresh(candidate) && !recheck.contains(&candidate) {
                    recheck.push(candidate);
                }
                return Err(Rejection::NotLexicographicallySmaller);
            }
        }
        if !mode_predicate(
            self.mode,
            view.net(),
            &self.silent,
            (new_event, new_cut),
            (candidate, old_cut),
        ) {
            return Err(Rejection::ModePredicate);
        }
        if !view.equivalent_cuts(new_cut, old_cut) {
            return Err(Rejection::InequivalentCuts);
        }
        Ok(())
    }
}

/// Mode-specific restriction of a correspondence between `new` and `old`,
/// each given as `(event, reached cut)`.
pub fn mode_predicate(
    mode: EquivalenceMode,
    net: &OccurrenceNet,
    silent: &SilentTransitions,
    new: (NodeId, &[NodeId]),
    old: (NodeId, &[NodeId]),
) -> bool {
    match mode {
        EquivalenceMode::Esparza => true,
        EquivalenceMode::EqualPredecessors => equal_predecessors(net, silent, new.0, old.0),
        EquivalenceMode::EqualDirectlyFollows => directly_follows_equivalent(net, new.1, old.1),
    }
}

/// Equal sets of visible transitions in the local configurations of `a` and `b`.
pub fn equal_predecessors(
    net: &OccurrenceNet,
    silent: &SilentTransitions,
    a: NodeId,
    b: NodeId,
) -> bool {
    let left = visible_transitions(net, silent, &local_configuration(net, a));
    let right = visible_transitions(net, silent, &local_configuration(net, b));
    left == right
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_names_round_trip_through_from_str() {
        for mode in [
            EquivalenceMode::Esparza,
            EquivalenceMode::EqualPredecessors,
            EquivalenceMode::EqualDirectlyFollows,
        ] {
            assert_eq!(mode.as_str().parse::<EquivalenceMode>(), Ok(mode));
        }
        assert_eq!("EQUAL_DFS".parse(), Ok(EquivalenceMode::EqualDirectlyFollows));
        assert!("fastest".parse::<EquivalenceMode>().is_err());
    }

    #[test]
    fn default_decision_is_not_a_cut_off() {
        let decision = CutoffDecision::default();
        assert!(!decision.is_cut_off());
        assert!(decision.recheck.is_empty());
    }
}
