#![doc = include_str!("../README.md")]

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use git2::{Commit, ErrorCode, Oid, Repository, Signature};
use std::path::Path;

const FALLBACK_NAME: &str = "comet";
const FALLBACK_EMAIL: &str = "comet@localhost";

/// Summary of one commit in a snapshot repository.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// Full hex OID.
    pub id: String,
    /// Short (8-char) hex OID.
    pub id_short: String,
    /// First line of the commit message.
    pub subject: String,
    /// ISO 8601 commit timestamp.
    pub timestamp: String,
}

// ============================================================================
// Public API
// ============================================================================

/// Open the repository rooted at `dir`, initializing one if there is none.
///
/// Parent directories are not searched: a storage directory that happens to
/// sit inside another work tree still gets its own repository.
pub fn ensure_repository(dir: &Path) -> Result<Repository> {
    match Repository::open(dir) {
        Ok(repo) => Ok(repo),
        Err(e) if e.code() == ErrorCode::NotFound => {
            let repo = Repository::init(dir)
                .with_context(|| format!("Failed to initialize repository in {}", dir.display()))?;
            tracing::info!(dir = %dir.display(), "initialized snapshot repository");
            Ok(repo)
        }
        Err(e) => {
            Err(e).with_context(|| format!("Failed to open repository in {}", dir.display()))
        }
    }
}

/// Stage `file` (relative to the work tree) and commit it on `HEAD`.
///
/// Returns `None` without committing when the staged tree is identical to
/// the current `HEAD` tree.
pub fn commit_file(repo: &Repository, file: &Path, message: &str) -> Result<Option<Oid>> {
    let mut index = repo.index()?;
    index
        .add_path(file)
        .with_context(|| format!("Failed to stage {}", file.display()))?;
    index.write()?;
    let tree_id = index.write_tree()?;

    let parent = head_commit(repo)?;
    if let Some(parent) = &parent
        && parent.tree_id() == tree_id
    {
        tracing::debug!(file = %file.display(), "snapshot unchanged since last commit");
        return Ok(None);
    }

    let tree = repo.find_tree(tree_id)?;
    let sig = signature(repo)?;
    let parents: Vec<&Commit> = parent.iter().collect();
    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .context("Failed to create commit")?;

    tracing::info!(commit = %short_oid(oid), file = %file.display(), "committed snapshot");
    Ok(Some(oid))
}

/// Ensure a repository in `dir` and commit `file_name` from it.
pub fn commit_snapshot(dir: &Path, file_name: &str, message: &str) -> Result<Option<Oid>> {
    let repo = ensure_repository(dir)?;
    commit_file(&repo, Path::new(file_name), message)
}

/// History of the repository in `dir`, if one has been created there.
pub fn snapshot_history(dir: &Path) -> Result<Vec<CommitInfo>> {
    match Repository::open(dir) {
        Ok(repo) => history(&repo),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(Vec::new()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to open repository in {}", dir.display()))
        }
    }
}

/// Commits reachable from `HEAD`, newest first. An empty repository has no
/// history.
pub fn history(repo: &Repository) -> Result<Vec<CommitInfo>> {
    if head_commit(repo)?.is_none() {
        return Ok(Vec::new());
    }

    let mut walker = repo.revwalk()?;
    walker.push_head()?;
    walker.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;

    let mut commits = Vec::new();
    for oid_result in walker {
        let commit = repo.find_commit(oid_result?)?;
        let timestamp = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string());
        let subject = commit
            .message()
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("")
            .to_string();
        commits.push(CommitInfo {
            id: commit.id().to_string(),
            id_short: short_oid(commit.id()),
            subject,
            timestamp,
        });
    }
    Ok(commits)
}

// ============================================================================
// Private helpers
// ============================================================================

fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The configured user, or a fixed Comet identity when git has none.
fn signature(repo: &Repository) -> Result<Signature<'static>> {
    match repo.signature() {
        Ok(sig) => Ok(sig),
        Err(_) => Ok(Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)?),
    }
}

fn short_oid(oid: Oid) -> String {
    oid.to_string().chars().take(8).collect()
}
