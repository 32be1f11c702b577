use crate::error::{Result, StoreError};
use comet::v1::Notebook;
use std::io::Write;
use std::path::Path;

/// Read a persisted notebook. A missing file is `Ok(None)`: there is simply
/// no reference to compare against yet.
pub fn read_notebook(path: &Path) -> Result<Option<Notebook>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

/// Write a notebook atomically: a temp file in the target directory is
/// renamed over `path`, so readers never see a partial snapshot.
pub fn write_notebook(path: &Path, notebook: &Notebook) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, notebook)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    tracing::debug!(path = %path.display(), cells = notebook.len(), "wrote notebook");
    Ok(())
}
