use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDateTime};
use clap::Args;
use comet::v1::{Action, Notebook, diff_all};
use comet_store::{ActionRecord, NotebookStore, StorageResolver};
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

// ============================================================================
// CLI argument types
// ============================================================================

#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Path of the notebook being saved
    #[arg(long)]
    notebook: PathBuf,

    /// Read the action JSON from this file instead of stdin
    #[arg(long)]
    input: Option<PathBuf>,

    /// Don't commit the snapshot to git
    #[arg(long)]
    no_git: bool,

    /// Don't archive timestamped copies
    #[arg(long)]
    no_versions: bool,

    /// Don't append the action to the action log
    #[arg(long)]
    no_actions: bool,

    /// Minimum seconds between archived copies
    #[arg(long, default_value_t = 60)]
    version_interval: u32,
}

// ============================================================================
// Save configuration and outcome
// ============================================================================

/// Which best-effort steps run after the change check.
#[derive(Debug, Clone)]
pub struct SaveConfig {
    pub track_git: bool,
    pub track_versions: bool,
    pub track_actions: bool,
    pub version_interval: Duration,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            track_git: true,
            track_versions: true,
            track_actions: true,
            version_interval: Duration::seconds(60),
        }
    }
}

impl From<&SaveArgs> for SaveConfig {
    fn from(args: &SaveArgs) -> Self {
        Self {
            track_git: !args.no_git,
            track_versions: !args.no_versions,
            track_actions: !args.no_actions,
            version_interval: Duration::seconds(i64::from(args.version_interval)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Unchanged,
    Saved,
    /// The event could not be checked and nothing was written.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub status: SaveStatus,
    pub changed: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveOutcome {
    fn with_status(status: SaveStatus) -> Self {
        Self {
            status,
            changed: Vec::new(),
            archived: None,
            commit: None,
            error: None,
        }
    }

    fn unchanged() -> Self {
        Self::with_status(SaveStatus::Unchanged)
    }

    fn skipped(error: impl std::fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::with_status(SaveStatus::Skipped)
        }
    }
}

// ============================================================================
// Save flow
// ============================================================================

/// Record `action` and persist its notebook if anything differs from the
/// stored snapshot.
///
/// A snapshot that cannot be read, or a document the diff engine rejects,
/// skips the event: the stored snapshot stays as it is and nothing is
/// archived or committed. Only a failure to write the snapshot is an error.
/// Logging the action, archiving a version, and committing to git are
/// skipped with a warning when they fail.
pub fn save_changes(
    store: &NotebookStore,
    action: &Action,
    config: &SaveConfig,
    now: NaiveDateTime,
) -> Result<SaveOutcome> {
    store
        .ensure_dirs()
        .with_context(|| format!("Failed to create {}", store.paths().dir.display()))?;

    let reference = match store.reference() {
        Ok(reference) => reference,
        Err(e) => {
            tracing::warn!(
                path = %store.paths().snapshot.display(),
                error = %e,
                "unreadable snapshot, skipping save"
            );
            return Ok(SaveOutcome::skipped(e));
        }
    };
    if config.track_actions {
        record_action(store, action, reference.as_ref());
    }

    let current = &action.model;
    let changed = match &reference {
        None => (0..current.len()).collect(),
        Some(reference) => match diff_all(current, Some(reference), true) {
            Ok(diff) if diff.is_empty() => {
                tracing::debug!(name = %store.paths().name, "no changes since last snapshot");
                return Ok(SaveOutcome::unchanged());
            }
            Ok(diff) => diff.indices(),
            Err(e) => {
                tracing::warn!(
                    action = %action.name,
                    error = %e,
                    "cannot compare against snapshot, skipping save"
                );
                return Ok(SaveOutcome::skipped(e));
            }
        },
    };

    store
        .write_snapshot(current)
        .context("Failed to write notebook snapshot")?;

    let archived = if config.track_versions {
        archive_version(store, current, now, config.version_interval)
    } else {
        None
    };
    let commit = if config.track_git {
        commit_snapshot(store)
    } else {
        None
    };

    Ok(SaveOutcome {
        changed,
        archived,
        commit,
        ..SaveOutcome::with_status(SaveStatus::Saved)
    })
}

fn record_action(store: &NotebookStore, action: &Action, reference: Option<&Notebook>) {
    let changed = match action.changes_against(reference) {
        Ok(diff) => diff.indices(),
        Err(e) => {
            tracing::warn!(action = %action.name, error = %e, "action not logged");
            return;
        }
    };
    if let Err(e) = store.actions().append(&ActionRecord::new(action, changed)) {
        tracing::warn!(action = %action.name, error = %e, "failed to append to action log");
    }
}

fn archive_version(
    store: &NotebookStore,
    notebook: &Notebook,
    now: NaiveDateTime,
    interval: Duration,
) -> Option<PathBuf> {
    match store.versions().archive_if_due(notebook, now, interval) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "failed to archive notebook version");
            None
        }
    }
}

fn commit_snapshot(store: &NotebookStore) -> Option<String> {
    let paths = store.paths();
    let message = format!("Save {}", paths.name);
    match comet_git::commit_snapshot(&paths.dir, &paths.snapshot_file_name(), &message) {
        Ok(oid) => oid.map(|oid| oid.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "failed to commit snapshot");
            None
        }
    }
}

// ============================================================================
// Command entry point
// ============================================================================

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read action from stdin")?;
            Ok(buf)
        }
    }
}

pub fn run(args: SaveArgs, resolver: &StorageResolver, pretty: bool) -> Result<()> {
    let action: Action = serde_json::from_str(&read_input(args.input.as_deref())?)
        .context("Failed to parse action JSON")?;
    let store = NotebookStore::open(resolver, &args.notebook)
        .with_context(|| format!("No storage for {}", args.notebook.display()))?;

    let outcome = save_changes(
        &store,
        &action,
        &SaveConfig::from(&args),
        Local::now().naive_local(),
    )?;
    println!("{}", crate::to_json(&outcome, pretty)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use comet::v1::{Cell, Output};
    use tempfile::TempDir;

    fn setup_store() -> (TempDir, NotebookStore) {
        let temp = TempDir::new().unwrap();
        let resolver = StorageResolver::new().with_data_dir(temp.path());
        let store = NotebookStore::open(&resolver, Path::new("/work/analysis.ipynb")).unwrap();
        (temp, store)
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 29)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn no_git() -> SaveConfig {
        SaveConfig {
            track_git: false,
            ..SaveConfig::default()
        }
    }

    fn notebook(sources: &[&str]) -> Notebook {
        Notebook::new(sources.iter().map(|s| Cell::code(*s)).collect())
    }

    #[test]
    fn test_first_save_writes_everything() {
        let (_temp, store) = setup_store();
        let action = Action::new("run-cell", 1_000, notebook(&["a", "b"])).with_selection(0, vec![0]);

        let outcome = save_changes(&store, &action, &no_git(), at(9, 0, 0)).unwrap();
        assert_eq!(outcome.status, SaveStatus::Saved);
        assert_eq!(outcome.changed, vec![0, 1]);
        assert!(outcome.archived.is_some());
        assert!(outcome.commit.is_none());

        assert_eq!(store.reference().unwrap(), Some(action.model.clone()));
        let records = store.actions().read().unwrap();
        assert_eq!(records.len(), 1);
        // nothing to compare against yet
        assert!(records[0].changed.is_empty());
    }

    #[test]
    fn test_unchanged_save_skips_snapshot() {
        let (_temp, store) = setup_store();
        let action = Action::new("run-cell", 1_000, notebook(&["a"])).with_selection(0, vec![0]);
        save_changes(&store, &action, &no_git(), at(9, 0, 0)).unwrap();
        let written = std::fs::metadata(&store.paths().snapshot)
            .unwrap()
            .modified()
            .unwrap();

        let again = Action::new("copy-cell", 2_000, notebook(&["a"])).with_selection(0, vec![0]);
        let outcome = save_changes(&store, &again, &no_git(), at(9, 5, 0)).unwrap();
        assert_eq!(outcome, SaveOutcome::unchanged());
        assert_eq!(
            std::fs::metadata(&store.paths().snapshot)
                .unwrap()
                .modified()
                .unwrap(),
            written
        );
        // the action is still logged
        assert_eq!(store.actions().read().unwrap().len(), 2);
        assert_eq!(store.versions().list().unwrap().len(), 1);
    }

    #[test]
    fn test_changed_cells_logged_and_reported() {
        let (_temp, store) = setup_store();
        let first = Action::new("run-cell", 1_000, notebook(&["a", "b"])).with_selection(0, vec![0]);
        save_changes(&store, &first, &no_git(), at(9, 0, 0)).unwrap();

        let mut model = notebook(&["a", "b"]);
        model.cells[1] = Cell::code("b").with_output(Output::stream("stdout", "hi"));
        let run = Action::new("run-cell", 2_000, model).with_selection(1, vec![1]);
        let outcome = save_changes(&store, &run, &no_git(), at(9, 0, 30)).unwrap();

        assert_eq!(outcome.status, SaveStatus::Saved);
        assert_eq!(outcome.changed, vec![1]);
        // archived 30s ago, inside the interval
        assert!(outcome.archived.is_none());

        let records = store.actions().read().unwrap();
        assert_eq!(records[1].changed, vec![1]);
    }

    #[test]
    fn test_invalid_action_is_not_logged_but_saved() {
        let (_temp, store) = setup_store();
        let first = Action::new("run-cell", 1_000, notebook(&["a", "b"])).with_selection(0, vec![0]);
        save_changes(&store, &first, &no_git(), at(9, 0, 0)).unwrap();

        let moved = Action::new("move-cell-up", 2_000, notebook(&["b", "a"])).with_selection(1, vec![0]);
        let outcome = save_changes(&store, &moved, &no_git(), at(9, 10, 0)).unwrap();

        assert_eq!(outcome.status, SaveStatus::Saved);
        assert_eq!(outcome.changed, vec![0, 1]);
        assert_eq!(store.actions().read().unwrap().len(), 1);
    }

    #[test]
    fn test_tracking_switches() {
        let (_temp, store) = setup_store();
        let config = SaveConfig {
            track_git: false,
            track_versions: false,
            track_actions: false,
            ..SaveConfig::default()
        };
        let action = Action::new("run-cell", 1_000, notebook(&["a"])).with_selection(0, vec![0]);
        let outcome = save_changes(&store, &action, &config, at(9, 0, 0)).unwrap();

        assert_eq!(outcome.status, SaveStatus::Saved);
        assert!(outcome.archived.is_none());
        assert!(store.versions().list().unwrap().is_empty());
        assert!(store.actions().read().unwrap().is_empty());
        assert!(!store.paths().dir.join(".git").exists());
    }

    #[test]
    fn test_git_commit_per_real_save() {
        let (_temp, store) = setup_store();
        let config = SaveConfig::default();

        let first = Action::new("run-cell", 1_000, notebook(&["a"])).with_selection(0, vec![0]);
        let outcome = save_changes(&store, &first, &config, at(9, 0, 0)).unwrap();
        assert!(outcome.commit.is_some());

        let same = Action::new("copy-cell", 2_000, notebook(&["a"])).with_selection(0, vec![0]);
        assert!(save_changes(&store, &same, &config, at(9, 1, 0)).unwrap().commit.is_none());

        let edited = Action::new("run-cell", 3_000, notebook(&["a2"])).with_selection(0, vec![0]);
        let outcome = save_changes(&store, &edited, &config, at(9, 2, 0)).unwrap();
        assert!(outcome.commit.is_some());

        let commits = comet_git::snapshot_history(&store.paths().dir).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].subject, "Save analysis");
    }

    #[test]
    fn test_corrupt_snapshot_is_left_in_place() {
        let (_temp, store) = setup_store();
        store.ensure_dirs().unwrap();
        std::fs::write(&store.paths().snapshot, "not a notebook").unwrap();

        let action = Action::new("run-cell", 1_000, notebook(&["a"])).with_selection(0, vec![0]);
        let outcome = save_changes(&store, &action, &SaveConfig::default(), at(9, 0, 0)).unwrap();

        assert_eq!(outcome.status, SaveStatus::Skipped);
        assert!(outcome.error.is_some());
        assert_eq!(
            std::fs::read_to_string(&store.paths().snapshot).unwrap(),
            "not a notebook"
        );
        assert!(store.versions().list().unwrap().is_empty());
        assert!(store.actions().read().unwrap().is_empty());
        assert!(!store.paths().dir.join(".git").exists());
    }

    #[test]
    fn test_malformed_snapshot_is_not_overwritten() {
        let (_temp, store) = setup_store();
        let mut malformed = notebook(&["a"]);
        malformed.cells[0].outputs = None;
        store.write_snapshot(&malformed).unwrap();

        let action = Action::new("run-cell", 1_000, notebook(&["a"])).with_selection(0, vec![0]);
        let outcome = save_changes(&store, &action, &SaveConfig::default(), at(9, 0, 0)).unwrap();

        assert_eq!(outcome.status, SaveStatus::Skipped);
        assert!(outcome.changed.is_empty());
        assert!(outcome.archived.is_none());
        assert!(outcome.error.unwrap().contains("malformed document at cell 0"));
        assert_eq!(store.reference().unwrap(), Some(malformed));
        assert!(store.versions().list().unwrap().is_empty());
        // resolving against the same snapshot fails too, so nothing is logged
        assert!(store.actions().read().unwrap().is_empty());
        assert!(!store.paths().dir.join(".git").exists());
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = SaveOutcome {
            changed: vec![2],
            commit: Some("abc".to_string()),
            ..SaveOutcome::with_status(SaveStatus::Saved)
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "saved", "changed": [2], "commit": "abc"})
        );
        let json = serde_json::to_value(SaveOutcome::unchanged()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "unchanged", "changed": []}));
        let json = serde_json::to_value(SaveOutcome::skipped("bad cell")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "skipped", "changed": [], "error": "bad cell"})
        );
    }

    #[test]
    fn test_config_from_args() {
        let args = SaveArgs {
            notebook: PathBuf::from("nb.ipynb"),
            input: None,
            no_git: true,
            no_versions: false,
            no_actions: true,
            version_interval: 120,
        };
        let config = SaveConfig::from(&args);
        assert!(!config.track_git);
        assert!(config.track_versions);
        assert!(!config.track_actions);
        assert_eq!(config.version_interval, Duration::seconds(120));
    }

    #[test]
    fn test_read_input_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("action.json");
        std::fs::write(&path, "{}").unwrap();
        assert_eq!(read_input(Some(&path)).unwrap(), "{}");
        assert!(read_input(Some(&temp.path().join("missing.json"))).is_err());
    }
}
