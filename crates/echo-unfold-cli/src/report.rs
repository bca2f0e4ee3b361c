// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Summary of an unfolded prefix, rendered as a table or JSON.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use echo_unfold::{Classification, EquivalenceMode, Prefix};
use serde::Serialize;

/// One row per event of the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRow {
    /// Node id of the event.
    pub id: u32,
    /// Transition name.
    pub transition: String,
    /// Size of the prime configuration.
    pub size: usize,
    /// Hex digest of the reached marking.
    pub marking: String,
    /// Status short name (`ok`, `cut-off`, ...).
    pub status: String,
    /// Node id of the corresponding event for cut-offs.
    pub corresponding: Option<u32>,
    /// Classification of the cut-off pair.
    pub classification: Option<Classification>,
}

/// Machine-readable summary of a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixReport {
    /// Mode used for the cut-off decisions.
    pub mode: EquivalenceMode,
    /// `false` when the event budget cut the unfolding short.
    pub complete: bool,
    /// Number of events.
    pub events: usize,
    /// Number of conditions.
    pub conditions: usize,
    /// Number of cut-off events.
    pub cut_offs: usize,
    /// Silent transition names in effect.
    pub silent: Vec<String>,
    /// Per-event rows in id order.
    pub rows: Vec<EventRow>,
}

impl PrefixReport {
    /// Collects the report for `prefix`.
    pub fn from_prefix(prefix: &Prefix) -> Self {
        let net = prefix.net();
        let classifications = prefix.classify_all();
        let rows = net
            .events()
            .map(|e| {
                let record = prefix.record(e);
                EventRow {
                    id: e.0,
                    transition: net.proper_name(e).to_owned(),
                    size: record.map_or(0, |r| r.size()),
                    marking: record.map(|r| hex::encode(r.hash)).unwrap_or_default(),
                    status: prefix.status().get(e).as_str().to_owned(),
                    corresponding: prefix.corresponding(e).map(|c| c.0),
                    classification: classifications
                        .iter()
                        .find(|p| p.cut_off == e)
                        .map(|p| p.classification),
                }
            })
            .collect();
        Self {
            mode: prefix.mode(),
            complete: prefix.is_complete(),
            events: net.event_count(),
            conditions: net.len() - net.event_count(),
            cut_offs: classifications.len(),
            silent: prefix.silent().iter().map(str::to_owned).collect(),
            rows,
        }
    }

    /// Renders the rows as a table followed by a one-line summary.
    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "event",
                "transition",
                "size",
                "marking",
                "status",
                "corresponding",
                "class",
            ]);
        for row in &self.rows {
            table.add_row(vec![
                format!("n{}", row.id),
                row.transition.clone(),
                row.size.to_string(),
                row.marking.chars().take(12).collect(),
                row.status.clone(),
                row.corresponding.map(|c| format!("n{c}")).unwrap_or_default(),
                row.classification.map(|c| c.to_string()).unwrap_or_default(),
            ]);
        }
        format!(
            "{table}\nmode {}: {} events, {} conditions, {} cut-offs{}\n",
            self.mode,
            self.events,
            self.conditions,
            self.cut_offs,
            if self.complete { "" } else { " (incomplete)" },
        )
    }
}
