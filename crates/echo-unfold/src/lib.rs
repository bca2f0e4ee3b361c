// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Complete-prefix unfolding of place/transition nets with pluggable cut-off
//! equivalence.
//!
//! The crate is organised bottom-up:
//!
//! - [`OccurrenceNet`]: arena of events and conditions linked by `pre`/`post`.
//! - [`history`]: local configurations, causal predecessors, and the widened
//!   directly-follows relation of an event.
//! - [`closure`]: completed precedence relations of a cut and directly-follows
//!   equivalence.
//! - [`CutoffOracle`]: the cut-off decision over a read-only [`PrefixView`],
//!   restricted by an [`EquivalenceMode`].
//! - [`classify`]: acyclic/cyclic and causal/exclusive classification of a
//!   committed cut-off pair.
//! - [`Unfolder`]: a reference driver that grows a prefix of a [`PetriNet`] and
//!   commits oracle verdicts into a [`StatusMap`].
//!
//! # Determinism
//!
//! For a fixed net, silent set and [`UnfoldOptions`], the produced prefix
//! (node ids, cut-offs, correspondences) is identical across runs. Every
//! collection whose order can leak into results is ordered (`BTreeMap`,
//! `BTreeSet`, sorted vectors); hash sets are only used for membership.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self
)]

pub mod classify;
pub mod closure;
pub mod history;
mod ident;
mod net;
mod occurrence;
mod oracle;
mod status;
mod unfolder;

pub use classify::{Classification, CorrespondenceLink, CutoffShape};
pub use closure::{ReachMatrix, Relation};
pub use ident::{marking_digest, Hash, LabelId, NodeId};
pub use net::{
    NetDescription, NetError, PetriNet, Place, PlaceIndex, PlaceSpec, SilentTransitions,
    Transition, TransitionIndex, TransitionSpec,
};
pub use occurrence::{Node, NodeKind, OccurrenceNet};
pub use oracle::{
    equal_predecessors, mode_predicate, CutoffDecision, CutoffOracle, EquivalenceMode,
    ParseModeError, PrefixView, Rejection,
};
pub use status::{NodeStatus, StatusMap};
pub use unfolder::{
    unfold, CutoffPair, EventRecord, Prefix, UnfoldError, UnfoldOptions, Unfolder,
};
