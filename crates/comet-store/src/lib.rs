#![doc = include_str!("../README.md")]

pub mod actions;
pub mod error;
pub mod paths;
pub mod report;
pub mod snapshot;
pub mod versions;

pub use actions::{ActionLog, ActionRecord};
pub use error::{Result, StoreError};
pub use paths::{NotebookPaths, StorageResolver};
pub use report::{CellKind, HistorySummary, VersionSummary};
pub use versions::{Version, VersionArchive};

use comet::v1::Notebook;
use std::path::Path;

/// Everything Comet persists for a single notebook.
///
/// # Example
///
/// ```rust,no_run
/// use comet_store::{NotebookStore, StorageResolver};
/// use std::path::Path;
///
/// let store = NotebookStore::open(
///     &StorageResolver::new(),
///     Path::new("/home/alex/analysis.ipynb"),
/// )?;
///
/// if let Some(reference) = store.reference()? {
///     println!("last snapshot has {} cells", reference.len());
/// }
/// # Ok::<(), comet_store::StoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct NotebookStore {
    paths: NotebookPaths,
    versions: VersionArchive,
    actions: ActionLog,
}

impl NotebookStore {
    /// Locate the storage for the notebook at `os_path`. Nothing is created
    /// until [`NotebookStore::ensure_dirs`] or a write.
    pub fn open(resolver: &StorageResolver, os_path: &Path) -> Result<Self> {
        Ok(Self::from_paths(resolver.notebook_paths(os_path)?))
    }

    pub fn from_paths(paths: NotebookPaths) -> Self {
        Self {
            versions: VersionArchive::new(&paths.versions, &paths.name),
            actions: ActionLog::new(&paths.action_log),
            paths,
        }
    }

    pub fn paths(&self) -> &NotebookPaths {
        &self.paths
    }

    pub fn versions(&self) -> &VersionArchive {
        &self.versions
    }

    pub fn actions(&self) -> &ActionLog {
        &self.actions
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        self.paths.ensure_dirs()
    }

    /// The last persisted snapshot, if any.
    pub fn reference(&self) -> Result<Option<Notebook>> {
        snapshot::read_notebook(&self.paths.snapshot)
    }

    pub fn write_snapshot(&self, notebook: &Notebook) -> Result<()> {
        self.ensure_dirs()?;
        snapshot::write_notebook(&self.paths.snapshot, notebook)?;
        tracing::info!(path = %self.paths.snapshot.display(), "saved snapshot");
        Ok(())
    }

    /// History summary built from the action log and every archived version.
    /// Versions that can no longer be read are left out.
    pub fn summary(&self) -> Result<HistorySummary> {
        let records = self.actions.read()?;
        let mut versions = Vec::new();
        for version in self.versions.list()? {
            match version.read() {
                Ok(Some(notebook)) => versions.push((version, notebook)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %version.path.display(), error = %e, "skipping unreadable version");
                }
            }
        }
        Ok(report::summarize(&self.paths.name, &records, &versions))
    }
}
