//! Summary of a notebook's tracked history: how long it was worked on, how
//! often code ran or cells were deleted, and what each archived version
//! looked like.

use crate::actions::ActionRecord;
use crate::versions::Version;
use comet::v1::{Cell, CellType, Notebook, OutputType};
use serde::Serialize;

/// Gaps between actions at least this long count as idle time.
pub const IDLE_CUTOFF_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub name: String,
    pub edit_time_secs: i64,
    pub num_runs: usize,
    pub num_deletions: usize,
    pub versions: Vec<VersionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionSummary {
    pub num: usize,
    pub time: String,
    pub cells: Vec<CellKind>,
}

/// A cell's type, refined for code cells by the most significant output it
/// carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Markdown,
    Raw,
    Code,
    Stream,
    ExecuteResult,
    DisplayData,
    Error,
}

/// Kind of a cell; for code cells the highest-ranked output present wins:
/// error > display_data > execute_result > stream.
pub fn cell_kind(cell: &Cell) -> CellKind {
    match cell.cell_type {
        CellType::Markdown => CellKind::Markdown,
        CellType::Raw => CellKind::Raw,
        CellType::Code => cell
            .outputs()
            .iter()
            .filter_map(|o| match o.output_type {
                OutputType::Error => Some(CellKind::Error),
                OutputType::DisplayData => Some(CellKind::DisplayData),
                OutputType::ExecuteResult => Some(CellKind::ExecuteResult),
                OutputType::Stream => Some(CellKind::Stream),
                OutputType::Other(_) => None,
            })
            .max_by_key(|k| output_rank(*k))
            .unwrap_or(CellKind::Code),
    }
}

fn output_rank(kind: CellKind) -> u8 {
    match kind {
        CellKind::Error => 4,
        CellKind::DisplayData => 3,
        CellKind::ExecuteResult => 2,
        CellKind::Stream => 1,
        CellKind::Markdown | CellKind::Raw | CellKind::Code => 0,
    }
}

/// Active editing time in seconds: gaps between consecutive actions,
/// excluding idle gaps.
pub fn edit_time_secs(records: &[ActionRecord]) -> i64 {
    let total_ms: i64 = records
        .windows(2)
        .map(|w| w[1].t - w[0].t)
        .filter(|gap| (0..IDLE_CUTOFF_SECS * 1000).contains(gap))
        .sum();
    total_ms / 1000
}

pub fn summarize(
    name: &str,
    records: &[ActionRecord],
    versions: &[(Version, Notebook)],
) -> HistorySummary {
    HistorySummary {
        name: name.to_string(),
        edit_time_secs: edit_time_secs(records),
        num_runs: records.iter().filter(|r| r.name.is_run()).count(),
        num_deletions: records.iter().filter(|r| r.name.is_deletion()).count(),
        versions: versions
            .iter()
            .enumerate()
            .map(|(num, (version, notebook))| VersionSummary {
                num,
                time: version.saved_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                cells: notebook.cells.iter().map(cell_kind).collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use comet::v1::{ActionName, MimeBundle, Output};
    use std::path::PathBuf;

    fn record(t: i64, name: &str) -> ActionRecord {
        ActionRecord {
            t,
            name: ActionName::from(name),
            index: 0,
            indices: vec![0],
            changed: vec![],
        }
    }

    #[test]
    fn test_cell_kind_ranking() {
        let plain = MimeBundle::new();
        assert_eq!(cell_kind(&Cell::markdown("x")), CellKind::Markdown);
        assert_eq!(cell_kind(&Cell::raw("x")), CellKind::Raw);
        assert_eq!(cell_kind(&Cell::code("x")), CellKind::Code);

        let cell = Cell::code("x")
            .with_output(Output::stream("stdout", "a"))
            .with_output(Output::execute_result(plain.clone(), 1));
        assert_eq!(cell_kind(&cell), CellKind::ExecuteResult);

        let cell = Cell::code("x")
            .with_output(Output::display_data(plain))
            .with_output(Output::error("E", "boom"));
        assert_eq!(cell_kind(&cell), CellKind::Error);
    }

    #[test]
    fn test_edit_time_skips_idle_gaps() {
        let records = vec![
            record(0, "run-cell"),
            record(10_000, "run-cell"),
            record(20_500, "insert-cell-below"),
            // an hour away from the keyboard
            record(3_620_500, "run-cell"),
            record(3_625_500, "run-cell"),
        ];
        assert_eq!(edit_time_secs(&records), 25);
        assert_eq!(edit_time_secs(&[]), 0);
    }

    #[test]
    fn test_summarize_counts() {
        let records = vec![
            record(0, "run-cell"),
            record(1_000, "run-all-cells"),
            record(2_000, "delete-cell"),
            record(3_000, "cut-cell"),
            record(4_000, "confirm-restart-kernel-and-run-all-cells"),
            record(5_000, "copy-cell"),
        ];
        let saved_at = NaiveDate::from_ymd_opt(2026, 1, 29)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let version = Version {
            path: PathBuf::from("nb-2026-01-29-09-30-00-000000.ipynb"),
            saved_at,
        };
        let notebook = Notebook::new(vec![
            Cell::markdown("# t"),
            Cell::code("1").with_output(Output::stream("stdout", "1")),
        ]);

        let summary = summarize("nb", &records, &[(version, notebook)]);
        assert_eq!(summary.name, "nb");
        assert_eq!(summary.num_runs, 3);
        assert_eq!(summary.num_deletions, 2);
        assert_eq!(summary.edit_time_secs, 5);
        assert_eq!(summary.versions.len(), 1);
        assert_eq!(summary.versions[0].time, "2026-01-29 09:30:00");
        assert_eq!(
            summary.versions[0].cells,
            vec![CellKind::Markdown, CellKind::Stream]
        );

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["versions"][0]["cells"][1], "stream");
    }
}
