use anyhow::{Context, Result};
use comet::v1::{DiffResult, diff, diff_all};
use comet_store::snapshot::read_notebook;
use std::path::{Path, PathBuf};

/// Diff `current` against `reference`. A missing reference file is treated
/// as "no reference" and yields an empty result.
fn diff_files(
    current: &Path,
    reference: &Path,
    indices: Option<&[usize]>,
    outputs: bool,
) -> Result<DiffResult> {
    let current_nb = read_notebook(current)
        .with_context(|| format!("Failed to read {}", current.display()))?
        .with_context(|| format!("Notebook not found: {}", current.display()))?;
    let reference_nb = read_notebook(reference)
        .with_context(|| format!("Failed to read {}", reference.display()))?;

    let result = match indices {
        Some(indices) => diff(indices, &current_nb, reference_nb.as_ref(), outputs),
        None => diff_all(&current_nb, reference_nb.as_ref(), outputs),
    };
    Ok(result?)
}

pub fn run(
    current: PathBuf,
    reference: PathBuf,
    indices: Option<Vec<usize>>,
    outputs: bool,
    pretty: bool,
) -> Result<()> {
    let result = diff_files(&current, &reference, indices.as_deref(), outputs)?;
    println!("{}", crate::to_json(&result, pretty)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use comet::v1::{Cell, Notebook, Output};
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, nb: &Notebook) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, nb.to_json().unwrap()).unwrap();
        path
    }

    fn pair() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let reference = Notebook::new(vec![Cell::markdown("# t"), Cell::code("x = 1")]);
        let current = Notebook::new(vec![
            Cell::markdown("# title"),
            Cell::code("x = 1").with_output(Output::stream("stdout", "1")),
            Cell::code("y = 2"),
        ]);
        let cur = write(temp.path(), "current.ipynb", &current);
        let refp = write(temp.path(), "reference.ipynb", &reference);
        (temp, cur, refp)
    }

    #[test]
    fn test_diff_all_cells() {
        let (_temp, cur, refp) = pair();
        let result = diff_files(&cur, &refp, None, false).unwrap();
        assert_eq!(result.indices(), vec![0, 2]);

        let result = diff_files(&cur, &refp, None, true).unwrap();
        assert_eq!(result.indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_diff_selected_indices() {
        let (_temp, cur, refp) = pair();
        let result = diff_files(&cur, &refp, Some(&[1, 2]), false).unwrap();
        assert_eq!(result.indices(), vec![2]);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["2"]["source"], "y = 2");
    }

    #[test]
    fn test_missing_reference_is_empty() {
        let (temp, cur, _refp) = pair();
        let result = diff_files(&cur, &temp.path().join("nope.ipynb"), None, true).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_missing_current_is_error() {
        let (temp, _cur, refp) = pair();
        assert!(diff_files(&temp.path().join("nope.ipynb"), &refp, None, true).is_err());
    }
}
