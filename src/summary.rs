//! Aggregate counters for a finished run.
//!
//! One [`Counts`] row overall and one per conference, printed as a table
//! when the user asks for the analysis.

use comfy_table::{Cell, CellAlignment, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use itertools::Itertools;
use tracing::info;

use crate::models::{Item, Period};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub total: usize,
    pub with_speaker: usize,
    pub with_artifact: usize,
    pub with_both: usize,
    pub downloaded: usize,
    pub rendered: usize,
}

impl Counts {
    pub fn add(&mut self, item: &Item) {
        let speaker = item.speaker.is_some();
        let artifact = item.artifact_url.is_some();
        self.total += 1;
        self.with_speaker += usize::from(speaker);
        self.with_artifact += usize::from(artifact);
        self.with_both += usize::from(speaker && artifact);
        self.downloaded += usize::from(item.local_artifact_path.is_some());
        self.rendered += usize::from(item.local_render_path.is_some());
    }

    fn cells(&self) -> [Cell; 6] {
        [
            self.total,
            self.with_speaker,
            self.with_artifact,
            self.with_both,
            self.downloaded,
            self.rendered,
        ]
        .map(|n| Cell::new(n).set_alignment(CellAlignment::Right))
    }
}

/// Overall and per-period counts, periods in calendar order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub overall: Counts,
    pub per_period: Vec<(Period, Counts)>,
}

impl Summary {
    pub fn from_items(items: &[Item]) -> Self {
        let mut overall = Counts::default();
        for item in items {
            overall.add(item);
        }

        let per_period = items
            .iter()
            .into_group_map_by(|item| item.period)
            .into_iter()
            .sorted_by_key(|(period, _)| *period)
            .map(|(period, group)| {
                let mut counts = Counts::default();
                for item in group {
                    counts.add(item);
                }
                (period, counts)
            })
            .collect();

        Self { overall, per_period }
    }

    pub fn log(&self) {
        let c = &self.overall;
        info!(
            conferences = self.per_period.len(),
            talks = c.total,
            with_speaker = c.with_speaker,
            with_pdf = c.with_artifact,
            with_both = c.with_both,
            downloaded = c.downloaded,
            printed = c.rendered,
            "Run summary"
        );
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec!["Conference", "Talks", "w/Spkr", "w/PDFs", "w/Both", "Dnld", "Print"]);

        let mut overall = vec![Cell::new("Overall")];
        overall.extend(self.overall.cells());
        table.add_row(overall);

        for (period, counts) in &self.per_period {
            let mut row = vec![Cell::new(period.conference_name())];
            row.extend(counts.cells());
            table.add_row(row);
        }
        table
    }
}
