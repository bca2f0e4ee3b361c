// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Argument parsing and command execution.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use echo_unfold::{unfold, EquivalenceMode, NetDescription, PetriNet};
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigService, FileConfigStore, UnfoldSettings, SETTINGS_KEY};
use crate::report::PrefixReport;

/// Output format of the report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable table.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
}

/// Unfold a place/transition net into a complete finite prefix.
#[derive(Parser, Debug)]
#[command(name = "echo-unfold", version, about)]
pub struct Cli {
    /// Net description (JSON).
    pub net: PathBuf,
    /// Settings file (JSON); defaults to the user config directory.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Cut-off equivalence: esparza, equal-preds or equal-dfs.
    #[arg(long)]
    pub mode: Option<EquivalenceMode>,
    /// Break equal-size ties by the lexicographic label key.
    #[arg(long)]
    pub lexicographic: bool,
    /// Additional silent transition name (repeatable).
    #[arg(long = "silent", value_name = "LABEL")]
    pub silent: Vec<String>,
    /// Do not treat unnamed and "tau "-prefixed transitions as silent.
    #[arg(long)]
    pub no_detect_silent: bool,
    /// Stop after this many events.
    #[arg(long)]
    pub max_events: Option<usize>,
    /// Report format.
    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub format: Format,
    /// Also write the prefix as a net description to this file.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Settings from the config file with command-line overrides applied.
    pub fn settings(&self) -> Result<UnfoldSettings> {
        let store = match &self.config {
            Some(path) => Some(FileConfigStore::pinned(path)),
            None => FileConfigStore::user().ok(),
        };
        let mut settings = match store {
            Some(store) => {
                let path = store.path_for(SETTINGS_KEY);
                // An explicit file must exist; an empty one means defaults.
                if self.config.is_some() && !path.is_file() {
                    anyhow::bail!("settings file {} not found", path.display());
                }
                let loaded = ConfigService::new(store)
                    .load::<UnfoldSettings>(SETTINGS_KEY)
                    .with_context(|| format!("failed to load settings from {}", path.display()))?;
                debug!(path = %path.display(), found = loaded.is_some(), "settings");
                loaded.unwrap_or_default()
            }
            None => UnfoldSettings::default(),
        };
        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if self.lexicographic {
            settings.lexicographic = true;
        }
        if self.no_detect_silent {
            settings.detect_silent = false;
        }
        if self.max_events.is_some() {
            settings.max_events = self.max_events;
        }
        settings.silent.extend(self.silent.iter().cloned());
        Ok(settings)
    }
}

/// Installs the stderr log subscriber; `RUST_LOG` takes precedence over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    // A subscriber may already be installed when embedded in tests.
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        debug!(%err, "keeping the installed log subscriber");
    }
}

/// Runs the command and returns the rendered report.
pub fn execute(cli: &Cli) -> Result<String> {
    let settings = cli.settings()?;
    let text = fs::read_to_string(&cli.net)
        .with_context(|| format!("failed to read net {}", cli.net.display()))?;
    let description: NetDescription = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse net {}", cli.net.display()))?;
    let net = PetriNet::from_description(&description)
        .with_context(|| format!("invalid net {}", cli.net.display()))?;

    let silent = settings.silent_transitions(&net);
    let prefix = unfold(&net, silent, settings.options()).context("unfolding failed")?;
    info!(
        events = prefix.net().event_count(),
        cut_offs = prefix.cut_offs().len(),
        complete = prefix.is_complete(),
        "unfolded {}",
        cli.net.display()
    );

    if let Some(out) = &cli.out {
        let json = serde_json::to_vec_pretty(&prefix.to_description())?;
        fs::write(out, json).with_context(|| format!("failed to write {}", out.display()))?;
    }

    let report = PrefixReport::from_prefix(&prefix);
    match cli.format {
        Format::Table => Ok(report.render_table()),
        Format::Json => {
            let mut json = serde_json::to_string_pretty(&report)?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// Parses arguments, runs the command and writes the report to stdout.
pub fn entrypoint() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = execute(&cli)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_settings() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("settings.json");
        fs::write(
            &file,
            br#"{ "mode": "equal-dfs", "max_events": 10, "silent": ["s"] }"#,
        )
        .unwrap();
        let cli = Cli::parse_from([
            "echo-unfold",
            "net.json",
            "--config",
            file.to_str().unwrap(),
            "--mode",
            "equal-preds",
            "--silent",
            "t",
            "--no-detect-silent",
        ]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.mode, EquivalenceMode::EqualPredecessors);
        assert_eq!(settings.max_events, Some(10));
        assert_eq!(settings.silent, vec!["s".to_owned(), "t".to_owned()]);
        assert!(!settings.detect_silent);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("absent.json");
        let cli = Cli::parse_from([
            "echo-unfold",
            "net.json",
            "--config",
            file.to_str().unwrap(),
        ]);
        let err = cli.settings().unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn empty_explicit_config_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.json");
        fs::write(&file, b"").unwrap();
        let cli = Cli::parse_from([
            "echo-unfold",
            "net.json",
            "--config",
            file.to_str().unwrap(),
            "--lexicographic",
        ]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.mode, EquivalenceMode::Esparza);
        assert!(settings.lexicographic);
        assert!(settings.detect_silent);
    }

    #[test]
    fn repeated_tracing_init_is_harmless() {
        init_tracing(0);
        init_tracing(2);
    }
}
