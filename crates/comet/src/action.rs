//! Notebook actions and the rule table that maps each one to the cell
//! positions it may have touched.

use crate::diff::{DiffResult, diff};
use crate::error::{CometError, Result};
use crate::types::Notebook;
use serde::{Deserialize, Serialize};

/// A notebook action name, as emitted by the notebook front-end.
///
/// Every name the resolver has a rule for gets its own variant; anything
/// else is kept verbatim in [`ActionName::Unrecognized`] and resolves to no
/// candidate indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionName {
    RunCell,
    ClearCellOutput,
    ChangeCellToMarkdown,
    ChangeCellToCode,
    ChangeCellToRaw,
    CopyCell,
    CutCell,
    ToggleCellOutputCollapsed,
    ToggleCellOutputScrolled,
    RunCellAndInsertBelow,
    RunCellAndSelectNext,
    InsertCellAbove,
    InsertCellBelow,
    PasteCellAbove,
    PasteCellBelow,
    PasteCellReplace,
    MoveCellDown,
    MoveCellUp,
    MergeCellWithNextCell,
    UnselectCell,
    MergeCellWithPreviousCell,
    MergeSelectedCells,
    MergeCells,
    SplitCellAtCursor,
    RunAllCells,
    RestartKernelAndClearOutput,
    ConfirmRestartKernelAndRunAllCells,
    UndoCellDeletion,
    RunAllCellsAbove,
    RunAllCellsBelow,
    Unrecognized(String),
}

impl ActionName {
    pub fn as_str(&self) -> &str {
        match self {
            ActionName::RunCell => "run-cell",
            ActionName::ClearCellOutput => "clear-cell-output",
            ActionName::ChangeCellToMarkdown => "change-cell-to-markdown",
            ActionName::ChangeCellToCode => "change-cell-to-code",
            ActionName::ChangeCellToRaw => "change-cell-to-raw",
            ActionName::CopyCell => "copy-cell",
            ActionName::CutCell => "cut-cell",
            ActionName::ToggleCellOutputCollapsed => "toggle-cell-output-collapsed",
            ActionName::ToggleCellOutputScrolled => "toggle-cell-output-scrolled",
            ActionName::RunCellAndInsertBelow => "run-cell-and-insert-below",
            ActionName::RunCellAndSelectNext => "run-cell-and-select-next",
            ActionName::InsertCellAbove => "insert-cell-above",
            ActionName::InsertCellBelow => "insert-cell-below",
            ActionName::PasteCellAbove => "paste-cell-above",
            ActionName::PasteCellBelow => "paste-cell-below",
            ActionName::PasteCellReplace => "paste-cell-replace",
            ActionName::MoveCellDown => "move-cell-down",
            ActionName::MoveCellUp => "move-cell-up",
            ActionName::MergeCellWithNextCell => "merge-cell-with-next-cell",
            ActionName::UnselectCell => "unselect-cell",
            ActionName::MergeCellWithPreviousCell => "merge-cell-with-previous-cell",
            ActionName::MergeSelectedCells => "merge-selected-cells",
            ActionName::MergeCells => "merge-cells",
            ActionName::SplitCellAtCursor => "split-cell-at-cursor",
            ActionName::RunAllCells => "run-all-cells",
            ActionName::RestartKernelAndClearOutput => "restart-kernel-and-clear-output",
            ActionName::ConfirmRestartKernelAndRunAllCells => {
                "confirm-restart-kernel-and-run-all-cells"
            }
            ActionName::UndoCellDeletion => "undo-cell-deletion",
            ActionName::RunAllCellsAbove => "run-all-cells-above",
            ActionName::RunAllCellsBelow => "run-all-cells-below",
            ActionName::Unrecognized(name) => name,
        }
    }

    /// Whether this action executes code (counted as a "run" in history
    /// summaries).
    pub fn is_run(&self) -> bool {
        let name = self.as_str();
        name.starts_with("run-") || *self == ActionName::ConfirmRestartKernelAndRunAllCells
    }

    /// Whether this action removes cells from the notebook.
    pub fn is_deletion(&self) -> bool {
        matches!(self.as_str(), "delete-cell" | "cut-cell")
    }
}

impl From<&str> for ActionName {
    fn from(name: &str) -> Self {
        match name {
            "run-cell" => ActionName::RunCell,
            "clear-cell-output" => ActionName::ClearCellOutput,
            "change-cell-to-markdown" => ActionName::ChangeCellToMarkdown,
            "change-cell-to-code" => ActionName::ChangeCellToCode,
            "change-cell-to-raw" => ActionName::ChangeCellToRaw,
            "copy-cell" => ActionName::CopyCell,
            "cut-cell" => ActionName::CutCell,
            "toggle-cell-output-collapsed" => ActionName::ToggleCellOutputCollapsed,
            "toggle-cell-output-scrolled" => ActionName::ToggleCellOutputScrolled,
            "run-cell-and-insert-below" => ActionName::RunCellAndInsertBelow,
            "run-cell-and-select-next" => ActionName::RunCellAndSelectNext,
            "insert-cell-above" => ActionName::InsertCellAbove,
            "insert-cell-below" => ActionName::InsertCellBelow,
            "paste-cell-above" => ActionName::PasteCellAbove,
            "paste-cell-below" => ActionName::PasteCellBelow,
            "paste-cell-replace" => ActionName::PasteCellReplace,
            "move-cell-down" => ActionName::MoveCellDown,
            "move-cell-up" => ActionName::MoveCellUp,
            "merge-cell-with-next-cell" => ActionName::MergeCellWithNextCell,
            "unselect-cell" => ActionName::UnselectCell,
            "merge-cell-with-previous-cell" => ActionName::MergeCellWithPreviousCell,
            "merge-selected-cells" => ActionName::MergeSelectedCells,
            "merge-cells" => ActionName::MergeCells,
            "split-cell-at-cursor" => ActionName::SplitCellAtCursor,
            "run-all-cells" => ActionName::RunAllCells,
            "restart-kernel-and-clear-output" => ActionName::RestartKernelAndClearOutput,
            "confirm-restart-kernel-and-run-all-cells" => {
                ActionName::ConfirmRestartKernelAndRunAllCells
            }
            "undo-cell-deletion" => ActionName::UndoCellDeletion,
            "run-all-cells-above" => ActionName::RunAllCellsAbove,
            "run-all-cells-below" => ActionName::RunAllCellsBelow,
            other => ActionName::Unrecognized(other.to_string()),
        }
    }
}

impl From<String> for ActionName {
    fn from(name: String) -> Self {
        match ActionName::from(name.as_str()) {
            ActionName::Unrecognized(_) => ActionName::Unrecognized(name),
            known => known,
        }
    }
}

impl From<ActionName> for String {
    fn from(name: ActionName) -> Self {
        match name {
            ActionName::Unrecognized(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ActionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One edit event posted by the notebook front-end, with the full notebook
/// as it stood right after the action.
///
/// # JSON shape
///
/// ```json
/// {
///   "t": 1706522400000,
///   "name": "run-cell",
///   "index": 2,
///   "indices": [2],
///   "model": { "cells": [ … ], "metadata": {}, "nbformat": 4, "nbformat_minor": 4 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "t")]
    pub timestamp: i64,
    pub name: ActionName,
    #[serde(rename = "index")]
    pub selected_index: usize,
    #[serde(rename = "indices", default)]
    pub selected_indices: Vec<usize>,
    pub model: Notebook,
}

impl Action {
    pub fn new(name: impl Into<ActionName>, timestamp: i64, model: Notebook) -> Self {
        Self {
            timestamp,
            name: name.into(),
            selected_index: 0,
            selected_indices: Vec::new(),
            model,
        }
    }

    /// Set the selection: the cursor cell and every selected cell.
    pub fn with_selection(mut self, selected_index: usize, selected_indices: Vec<usize>) -> Self {
        self.selected_index = selected_index;
        self.selected_indices = selected_indices;
        self
    }

    /// Candidate indices for this action, given the cell count of the
    /// notebook it is compared against.
    pub fn candidate_indices(&self, len_prior: usize) -> Result<Vec<usize>> {
        resolve(
            &self.name,
            self.selected_index,
            &self.selected_indices,
            self.model.len(),
            len_prior,
        )
    }

    /// Resolve this action's candidate indices and diff them, outputs
    /// included, against the last persisted notebook.
    ///
    /// Without a reference the prior length is taken to be the current one
    /// and the result is empty.
    pub fn changes_against(&self, reference: Option<&Notebook>) -> Result<DiffResult> {
        let len_prior = reference.map_or(self.model.len(), Notebook::len);
        let indices = self.candidate_indices(len_prior)?;
        diff(&indices, &self.model, reference, true)
    }
}

/// Predict which cell positions `action` could have changed.
///
/// `len_current` is the cell count after the action, `len_prior` the cell
/// count of the notebook being compared against; their difference is how
/// many cells a paste inserted. Unrecognized actions yield no indices.
///
/// # Errors
///
/// [`CometError::InvalidActionState`] when a rule needs the first or last
/// selected index and `selected_indices` is empty, when `move-cell-up`
/// would point above the first cell, or when a position past the selection
/// does not fit in `usize`.
///
/// # Examples
///
/// ```
/// use comet::v1::{resolve, ActionName};
///
/// let below = resolve(&ActionName::InsertCellBelow, 3, &[3], 8, 7).unwrap();
/// assert_eq!(below, vec![4]);
///
/// let pasted = resolve(&ActionName::PasteCellBelow, 2, &[2], 10, 7).unwrap();
/// assert_eq!(pasted, vec![3, 4, 5]);
///
/// let unknown = resolve(&"delete-cell".into(), 1, &[1], 4, 5).unwrap();
/// assert!(unknown.is_empty());
/// ```
pub fn resolve(
    action: &ActionName,
    selected_index: usize,
    selected_indices: &[usize],
    len_current: usize,
    len_prior: usize,
) -> Result<Vec<usize>> {
    let first = || {
        selected_indices
            .iter()
            .copied()
            .min()
            .ok_or_else(|| empty_selection(action))
    };
    let last = || {
        selected_indices
            .iter()
            .copied()
            .max()
            .ok_or_else(|| empty_selection(action))
    };
    let inserted = len_current.saturating_sub(len_prior);

    let indices = match action {
        ActionName::RunCell
        | ActionName::ClearCellOutput
        | ActionName::ChangeCellToMarkdown
        | ActionName::ChangeCellToCode
        | ActionName::ChangeCellToRaw
        | ActionName::CopyCell
        | ActionName::CutCell
        | ActionName::ToggleCellOutputCollapsed
        | ActionName::ToggleCellOutputScrolled => selected_indices.to_vec(),

        ActionName::RunCellAndInsertBelow | ActionName::RunCellAndSelectNext => {
            with_extra(selected_indices, next(action, last()?)?)
        }

        ActionName::InsertCellAbove => vec![first()?],
        ActionName::InsertCellBelow => vec![next(action, last()?)?],

        ActionName::PasteCellAbove => span(action, first()?, inserted)?,
        ActionName::PasteCellBelow => span(action, next(action, last()?)?, inserted)?,
        ActionName::PasteCellReplace => {
            let replaced = len_current
                .saturating_add(selected_indices.len())
                .saturating_sub(len_prior);
            span(action, first()?, replaced)?
        }

        ActionName::MoveCellDown => {
            let below = next(action, last()?)?;
            if below < len_current {
                with_extra(selected_indices, below)
            } else {
                Vec::new()
            }
        }
        ActionName::MoveCellUp => {
            if selected_index == 0 {
                Vec::new()
            } else {
                let above = first()?
                    .checked_sub(1)
                    .ok_or_else(|| CometError::InvalidActionState {
                        action: action.to_string(),
                        reason: format!(
                            "first selected cell is 0 but cursor is at {selected_index}"
                        ),
                    })?;
                with_extra(selected_indices, above)
            }
        }

        ActionName::MergeCellWithNextCell | ActionName::UnselectCell => vec![selected_index],
        ActionName::MergeCellWithPreviousCell => vec![selected_index.saturating_sub(1)],
        ActionName::MergeSelectedCells | ActionName::MergeCells => vec![first()?],
        ActionName::SplitCellAtCursor => vec![first()?, next(action, selected_index)?],

        ActionName::RunAllCells
        | ActionName::RestartKernelAndClearOutput
        | ActionName::ConfirmRestartKernelAndRunAllCells
        | ActionName::UndoCellDeletion => (0..len_current).collect(),

        ActionName::RunAllCellsAbove => (0..selected_index).collect(),
        ActionName::RunAllCellsBelow => (selected_index..len_current).collect(),

        ActionName::Unrecognized(_) => Vec::new(),
    };

    tracing::debug!(action = %action, ?indices, "resolved candidate indices");
    Ok(indices)
}

fn empty_selection(action: &ActionName) -> CometError {
    CometError::InvalidActionState {
        action: action.to_string(),
        reason: "no cells selected".into(),
    }
}

fn with_extra(selected: &[usize], extra: usize) -> Vec<usize> {
    let mut indices = selected.to_vec();
    indices.push(extra);
    indices
}

/// The position after `index`.
fn next(action: &ActionName, index: usize) -> Result<usize> {
    index.checked_add(1).ok_or_else(|| out_of_range(action, index))
}

fn span(action: &ActionName, start: usize, len: usize) -> Result<Vec<usize>> {
    let end = start
        .checked_add(len)
        .ok_or_else(|| out_of_range(action, start))?;
    Ok((start..end).collect())
}

fn out_of_range(action: &ActionName, index: usize) -> CometError {
    CometError::InvalidActionState {
        action: action.to_string(),
        reason: format!("cell index {index} is out of range"),
    }
}
