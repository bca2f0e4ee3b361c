// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Post-hoc classification of cut-off correspondences.
//!
//! None of these predicates influence the cut-off decision. They describe an
//! already committed pair for downstream analyses and reports.
use std::collections::BTreeSet;
use std::fmt;

use crate::history::{is_causal_predecessor, local_configuration, visible_transitions};
use crate::ident::NodeId;
use crate::net::SilentTransitions;
use crate::occurrence::OccurrenceNet;

/// Whether the cut-off and its correspondent share their concurrent context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CutoffShape {
    /// Both cuts agree once each event's own outputs are removed.
    Acyclic,
    /// The concurrent contexts differ.
    Cyclic,
}

/// How the corresponding event relates causally to the cut-off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CorrespondenceLink {
    /// The corresponding event lies in the causal past of the cut-off.
    Causal,
    /// The corresponding event is in conflict with (or concurrent to) the
    /// cut-off.
    Exclusive,
}

/// Classification of one cut-off pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Classification {
    /// Acyclic or cyclic.
    pub shape: CutoffShape,
    /// Causal or exclusive.
    pub link: CorrespondenceLink,
    /// Visible transitions of both local configurations coincide.
    pub containment: bool,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.shape {
            CutoffShape::Acyclic => "acyclic",
            CutoffShape::Cyclic => "cyclic",
        };
        let link = match self.link {
            CorrespondenceLink::Causal => "causal",
            CorrespondenceLink::Exclusive => "exclusive",
        };
        write!(f, "{shape}/{link}")?;
        if self.containment {
            f.write_str("+contained")?;
        }
        Ok(())
    }
}

/// Concurrency equivalence: after removing each event's own output conditions
/// from its cut, the remaining condition sets are equal.
pub fn is_acyclic(
    net: &OccurrenceNet,
    cut_off: NodeId,
    corresponding: NodeId,
    cut_off_cut: &[NodeId],
    corresponding_cut: &[NodeId],
) -> bool {
    let context = |event: NodeId, cut: &[NodeId]| -> BTreeSet<NodeId> {
        let outputs = net.post(event);
        cut.iter().copied().filter(|c| !outputs.contains(c)).collect()
    };
    context(cut_off, cut_off_cut) == context(corresponding, corresponding_cut)
}

/// Visible transitions of both local configurations contain each other.
pub fn is_cyclic_containment(
    net: &OccurrenceNet,
    silent: &SilentTransitions,
    cut_off: NodeId,
    corresponding: NodeId,
) -> bool {
    let left = visible_transitions(net, silent, &local_configuration(net, cut_off));
    let right = visible_transitions(net, silent, &local_configuration(net, corresponding));
    left.is_subset(&right) && right.is_subset(&left)
}

/// `corresponding` is a strict causal predecessor of `cut_off`.
pub fn is_corr_in_local_config(
    net: &OccurrenceNet,
    cut_off: NodeId,
    corresponding: NodeId,
) -> bool {
    is_causal_predecessor(net, cut_off, corresponding)
}

/// Classifies the committed pair `cut_off -> corresponding`.
pub fn classify(
    net: &OccurrenceNet,
    silent: &SilentTransitions,
    cut_off: NodeId,
    corresponding: NodeId,
    cut_off_cut: &[NodeId],
    corresponding_cut: &[NodeId],
) -> Classification {
    let shape = if is_acyclic(net, cut_off, corresponding, cut_off_cut, corresponding_cut) {
        CutoffShape::Acyclic
    } else {
        CutoffShape::Cyclic
    };
    let link = if is_corr_in_local_config(net, cut_off, corresponding) {
        CorrespondenceLink::Causal
    } else {
        CorrespondenceLink::Exclusive
    };
    Classification {
        shape,
        link,
        containment: is_cyclic_containment(net, silent, cut_off, corresponding),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::LabelId;

    /// `s -> a -> p -> b -> q` with an untouched initial condition `r`.
    fn chain() -> (OccurrenceNet, [NodeId; 6]) {
        let names = ["s", "p", "q", "r", "a", "b"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut net = OccurrenceNet::new(names);
        let s = net.add_condition(LabelId(0), None);
        let r = net.add_condition(LabelId(3), None);
        let a = net.add_event(LabelId(4), &[s]);
        let p = net.add_condition(LabelId(1), Some(a));
        let b = net.add_event(LabelId(5), &[p]);
        let q = net.add_condition(LabelId(2), Some(b));
        (net, [a, b, p, q, r, s])
    }

    #[test]
    fn shared_context_is_acyclic() {
        let (net, [a, b, p, q, r, _]) = chain();
        assert!(is_acyclic(&net, b, a, &[q, r], &[p, r]));
        assert!(!is_acyclic(&net, b, a, &[q], &[p, r]));
    }

    #[test]
    fn causal_link_follows_pre_edges_only() {
        let (net, [a, b, ..]) = chain();
        assert!(is_corr_in_local_config(&net, b, a));
        assert!(!is_corr_in_local_config(&net, a, b));
        assert!(!is_corr_in_local_config(&net, a, a));
    }

    #[test]
    fn containment_ignores_silent_transitions() {
        let (net, [a, b, ..]) = chain();
        assert!(!is_cyclic_containment(&net, &SilentTransitions::none(), b, a));
        let silent: SilentTransitions = ["b"].into_iter().collect();
        assert!(is_cyclic_containment(&net, &silent, b, a));
    }

    #[test]
    fn display_is_compact() {
        let c = Classification {
            shape: CutoffShape::Cyclic,
            link: CorrespondenceLink::Exclusive,
            containment: true,
        };
        assert_eq!(c.to_string(), "cyclic/exclusive+contained");
    }
}
