// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! CLI entry point for echo-unfold.

use anyhow::Result;
use echo_unfold_cli::cli::entrypoint;

fn main() -> Result<()> {
    entrypoint()
}
