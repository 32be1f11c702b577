//! Cell-level comparison of a notebook against its last persisted snapshot.

use crate::error::{CometError, Result};
use crate::types::{Cell, CellType, Notebook, Output, OutputPayload};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cells of the current notebook judged different from the reference,
/// keyed by their position in the current notebook.
///
/// A position that did not exist in the reference counts as changed. The
/// whole cell is reported; there is no finer-grained patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffResult {
    cells: BTreeMap<usize, Cell>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.cells.contains_key(&index)
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(&index)
    }

    /// Changed positions in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        self.cells.keys().copied().collect()
    }
}

/// Compare the cells at `indices` between `current` and `reference`.
///
/// - With no reference there is nothing to compare against and the result
///   is empty.
/// - The first index at or past the end of `current` stops the scan; later
///   indices are not inspected.
/// - A position past the end of `reference` is new and therefore changed.
/// - Otherwise a cell changed when its type or source differs, or, with
///   `compare_outputs` set and a code cell, when its outputs differ in
///   count, in `output_type`, or in the payload of that type.
///
/// # Errors
///
/// [`CometError::MalformedDocument`] when outputs are compared and a code
/// cell has no `outputs` field, or an output lacks the payload field its
/// `output_type` requires.
///
/// # Examples
///
/// ```
/// use comet::v1::{diff, Cell, Notebook, Output};
///
/// let reference = Notebook::new(vec![
///     Cell::markdown("# Notes"),
///     Cell::code("print(1)").with_output(Output::stream("stdout", "1\n")),
/// ]);
/// let mut current = reference.clone();
/// current.cells[1] = Cell::code("print(1)").with_output(Output::stream("stdout", "2\n"));
/// current.cells.push(Cell::code("x = 2"));
///
/// let changes = diff(&[0, 1, 2], &current, Some(&reference), true).unwrap();
/// assert_eq!(changes.indices(), vec![1, 2]);
///
/// let source_only = diff(&[0, 1, 2], &current, Some(&reference), false).unwrap();
/// assert_eq!(source_only.indices(), vec![2]);
/// ```
pub fn diff(
    indices: &[usize],
    current: &Notebook,
    reference: Option<&Notebook>,
    compare_outputs: bool,
) -> Result<DiffResult> {
    let mut result = DiffResult::default();
    let Some(reference) = reference else {
        return Ok(result);
    };

    for &index in indices {
        let Some(cell) = current.cells.get(index) else {
            break;
        };
        if cell_changed(index, cell, reference.cells.get(index), compare_outputs)? {
            result.cells.insert(index, cell.clone());
        }
    }

    tracing::debug!(
        candidates = indices.len(),
        changed = result.len(),
        compare_outputs,
        "compared candidate cells"
    );
    Ok(result)
}

/// Compare every cell of `current` against `reference`.
pub fn diff_all(
    current: &Notebook,
    reference: Option<&Notebook>,
    compare_outputs: bool,
) -> Result<DiffResult> {
    let indices: Vec<usize> = (0..current.len()).collect();
    diff(&indices, current, reference, compare_outputs)
}

fn cell_changed(
    index: usize,
    current: &Cell,
    prior: Option<&Cell>,
    compare_outputs: bool,
) -> Result<bool> {
    let Some(prior) = prior else {
        return Ok(true);
    };
    if current.cell_type != prior.cell_type || current.source != prior.source {
        return Ok(true);
    }
    if !compare_outputs {
        return Ok(false);
    }
    match current.cell_type {
        CellType::Code => outputs_changed(index, current, prior),
        CellType::Markdown | CellType::Raw => Ok(false),
    }
}

fn outputs_changed(index: usize, current: &Cell, prior: &Cell) -> Result<bool> {
    let now = required_outputs(index, current)?;
    let before = required_outputs(index, prior)?;
    if now.len() != before.len() {
        return Ok(true);
    }

    for (position, (a, b)) in now.iter().zip(before).enumerate() {
        if a.output_type != b.output_type {
            return Ok(true);
        }
        if payload_of(index, position, a)? != payload_of(index, position, b)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn required_outputs(index: usize, cell: &Cell) -> Result<&[Output]> {
    cell.outputs
        .as_deref()
        .ok_or_else(|| CometError::MalformedDocument {
            index,
            output: None,
            reason: "code cell has no `outputs` field".into(),
        })
}

fn payload_of(index: usize, position: usize, output: &Output) -> Result<OutputPayload<'_>> {
    output.payload().ok_or_else(|| CometError::MalformedDocument {
        index,
        output: Some(position),
        reason: format!(
            "{} output has no `{}` field",
            output.output_type,
            output.output_type.payload_field().unwrap_or("payload")
        ),
    })
}
