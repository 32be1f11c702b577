use anyhow::{Context, Result};
use comet_store::{HistorySummary, NotebookStore, StorageResolver};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct VersionListing {
    archived: Vec<ArchivedVersion>,
    commits: Vec<CommitEntry>,
}

#[derive(Debug, Serialize)]
struct ArchivedVersion {
    path: PathBuf,
    saved_at: String,
}

#[derive(Debug, Serialize)]
struct CommitEntry {
    id: String,
    subject: String,
    timestamp: String,
}

fn open_store(notebook: &Path, resolver: &StorageResolver) -> Result<NotebookStore> {
    NotebookStore::open(resolver, notebook)
        .with_context(|| format!("No storage for {}", notebook.display()))
}

fn summary(store: &NotebookStore) -> Result<HistorySummary> {
    store.summary().context("Failed to summarize notebook history")
}

fn list_versions(store: &NotebookStore) -> Result<VersionListing> {
    let archived = store
        .versions()
        .list()
        .context("Failed to list archived versions")?
        .into_iter()
        .map(|v| ArchivedVersion {
            saved_at: v.saved_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            path: v.path,
        })
        .collect();
    let commits = comet_git::snapshot_history(&store.paths().dir)?
        .into_iter()
        .map(|c| CommitEntry {
            id: c.id,
            subject: c.subject,
            timestamp: c.timestamp,
        })
        .collect();
    Ok(VersionListing { archived, commits })
}

pub fn run_report(notebook: PathBuf, resolver: &StorageResolver, pretty: bool) -> Result<()> {
    let store = open_store(&notebook, resolver)?;
    println!("{}", crate::to_json(&summary(&store)?, pretty)?);
    Ok(())
}

pub fn run_versions(notebook: PathBuf, resolver: &StorageResolver, pretty: bool) -> Result<()> {
    let store = open_store(&notebook, resolver)?;
    println!("{}", crate::to_json(&list_versions(&store)?, pretty)?);
    Ok(())
}
