use crate::error::{Result, StoreError};
use sha2::{Digest, Sha256};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the storage root.
pub const DATA_DIR_ENV: &str = "COMET_DATA_DIR";

/// Resolves where Comet keeps its data.
///
/// The storage root is, in order: an explicit [`with_data_dir`], the
/// `COMET_DATA_DIR` environment variable, or `$HOME/.comet`.
///
/// [`with_data_dir`]: StorageResolver::with_data_dir
#[derive(Debug, Clone)]
pub struct StorageResolver {
    home_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
}

impl Default for StorageResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageResolver {
    pub fn new() -> Self {
        Self {
            home_dir: dirs::home_dir(),
            data_dir: env::var_os(DATA_DIR_ENV).map(PathBuf::from),
        }
    }

    pub fn with_home<P: Into<PathBuf>>(mut self, home: P) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    pub fn with_data_dir<P: Into<PathBuf>>(mut self, data_dir: P) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn home_dir(&self) -> Result<&Path> {
        self.home_dir.as_deref().ok_or(StoreError::NoHomeDirectory)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref data_dir) = self.data_dir {
            return Ok(data_dir.clone());
        }

        let home = self.home_dir()?;
        Ok(home.join(".comet"))
    }

    /// Storage locations for the notebook at `os_path`.
    ///
    /// Notebooks with the same file name in different directories get
    /// different storage directories: the parent directory is hashed into
    /// the path.
    pub fn notebook_paths(&self, os_path: &Path) -> Result<NotebookPaths> {
        let name = os_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StoreError::InvalidNotebookPath(os_path.to_path_buf()))?
            .to_string();
        let parent = os_path.parent().unwrap_or_else(|| Path::new(""));
        let dir = self.data_dir()?.join(hash_dir(parent)).join(&name);
        Ok(NotebookPaths::new(dir, name))
    }

    pub fn exists(&self) -> bool {
        self.data_dir().map(|p| p.exists()).unwrap_or(false)
    }
}

/// Every file Comet keeps for one notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookPaths {
    /// Notebook file stem, e.g. `analysis` for `analysis.ipynb`.
    pub name: String,
    /// The notebook's storage directory (also the git work tree).
    pub dir: PathBuf,
    /// Last persisted snapshot, the reference for change detection.
    pub snapshot: PathBuf,
    /// Directory of timestamped copies.
    pub versions: PathBuf,
    /// JSONL log of every recorded action.
    pub action_log: PathBuf,
}

impl NotebookPaths {
    pub fn new(dir: PathBuf, name: String) -> Self {
        Self {
            snapshot: dir.join(format!("{name}.ipynb")),
            versions: dir.join("versions"),
            action_log: dir.join(format!("{name}.actions.jsonl")),
            name,
            dir,
        }
    }

    /// Snapshot file name relative to [`NotebookPaths::dir`].
    pub fn snapshot_file_name(&self) -> String {
        format!("{}.ipynb", self.name)
    }

    /// Create the storage and versions directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.versions)?;
        Ok(())
    }
}

/// Short, stable identifier for a notebook's directory.
pub fn hash_dir(dir: &Path) -> String {
    let digest = Sha256::digest(dir.to_string_lossy().as_bytes());
    hex::encode(digest)[..16].to_string()
}

mod dirs {
    use super::*;

    pub fn home_dir() -> Option<PathBuf> {
        env::var_os("HOME")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_data_dir_defaults_under_home() {
        let resolver = StorageResolver {
            home_dir: Some(PathBuf::from("/custom/home")),
            data_dir: None,
        };
        assert_eq!(
            resolver.data_dir().unwrap(),
            PathBuf::from("/custom/home/.comet")
        );
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let resolver = StorageResolver::new()
            .with_home("/custom/home")
            .with_data_dir("/srv/comet");
        assert_eq!(resolver.data_dir().unwrap(), PathBuf::from("/srv/comet"));
    }

    #[test]
    fn test_no_home_directory() {
        let resolver = StorageResolver {
            home_dir: None,
            data_dir: None,
        };
        assert!(matches!(
            resolver.data_dir(),
            Err(StoreError::NoHomeDirectory)
        ));
    }

    #[test]
    fn test_notebook_paths_layout() {
        let temp = TempDir::new().unwrap();
        let resolver = StorageResolver::new().with_data_dir(temp.path());
        let paths = resolver.notebook_paths(Path::new("/work/project/analysis.ipynb")).unwrap();

        let expected_dir = temp
            .path()
            .join(hash_dir(Path::new("/work/project")))
            .join("analysis");
        assert_eq!(paths.name, "analysis");
        assert_eq!(paths.dir, expected_dir);
        assert_eq!(paths.snapshot, expected_dir.join("analysis.ipynb"));
        assert_eq!(paths.versions, expected_dir.join("versions"));
        assert_eq!(
            paths.action_log,
            expected_dir.join("analysis.actions.jsonl")
        );
        assert_eq!(paths.snapshot_file_name(), "analysis.ipynb");
    }

    #[test]
    fn test_same_name_different_dirs() {
        let resolver = StorageResolver::new().with_data_dir("/data");
        let a = resolver.notebook_paths(Path::new("/a/notes.ipynb")).unwrap();
        let b = resolver.notebook_paths(Path::new("/b/notes.ipynb")).unwrap();
        assert_ne!(a.dir, b.dir);
        assert_eq!(a.name, b.name);
    }

    #[test]
    fn test_hash_dir_is_stable_and_short() {
        let h = hash_dir(Path::new("/work/project"));
        assert_eq!(h.len(), 16);
        assert_eq!(h, hash_dir(Path::new("/work/project")));
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_invalid_notebook_path() {
        let resolver = StorageResolver::new().with_data_dir("/data");
        assert!(matches!(
            resolver.notebook_paths(Path::new("/")),
            Err(StoreError::InvalidNotebookPath(_))
        ));
    }

    #[test]
    fn test_ensure_dirs() {
        let temp = TempDir::new().unwrap();
        let resolver = StorageResolver::new().with_data_dir(temp.path());
        let paths = resolver.notebook_paths(Path::new("/x/nb.ipynb")).unwrap();
        paths.ensure_dirs().unwrap();
        assert!(paths.versions.is_dir());
        assert!(resolver.exists());
    }
}
