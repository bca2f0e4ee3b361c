// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command-line front end for `echo-unfold`.
//!
//! Loads a JSON net description, resolves settings (config file, then flags),
//! runs the reference unfolder and reports every event with its cut-off
//! status as a table or JSON. Optionally exports the prefix itself as a net
//! description.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]

pub mod cli;
pub mod config;
pub mod report;
