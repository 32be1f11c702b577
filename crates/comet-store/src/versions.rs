use crate::error::Result;
use crate::snapshot::{read_notebook, write_notebook};
use chrono::{Duration, NaiveDateTime, Timelike};
use comet::v1::Notebook;
use std::path::{Path, PathBuf};

const STAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// An archived copy of a notebook, named `<name>-YYYY-MM-DD-HH-MM-SS-ffffff.ipynb`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub path: PathBuf,
    pub saved_at: NaiveDateTime,
}

impl Version {
    pub fn read(&self) -> Result<Option<Notebook>> {
        read_notebook(&self.path)
    }
}

/// Timestamped copies of one notebook, kept at most once per interval.
#[derive(Debug, Clone)]
pub struct VersionArchive {
    dir: PathBuf,
    name: String,
}

impl VersionArchive {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archived versions, oldest first. Files that don't follow the naming
    /// scheme are ignored.
    pub fn list(&self) -> Result<Vec<Version>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("ipynb") {
                continue;
            }
            if let Some(saved_at) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| self.parse_stamp(stem))
            {
                versions.push(Version { path, saved_at });
            }
        }
        versions.sort_by(|a, b| a.saved_at.cmp(&b.saved_at));
        Ok(versions)
    }

    pub fn latest(&self) -> Result<Option<Version>> {
        Ok(self.list()?.pop())
    }

    /// Whether a version was archived less than `interval` before `now`.
    pub fn was_saved_recently(&self, now: NaiveDateTime, interval: Duration) -> Result<bool> {
        Ok(self
            .latest()?
            .is_some_and(|v| now.signed_duration_since(v.saved_at) < interval))
    }

    /// Write a copy of `notebook` stamped with `now`.
    pub fn archive(&self, notebook: &Notebook, now: NaiveDateTime) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.ipynb", self.file_stem(now)));
        write_notebook(&path, notebook)?;
        tracing::info!(path = %path.display(), "archived notebook version");
        Ok(path)
    }

    /// Archive unless a version was already saved within `interval`.
    pub fn archive_if_due(
        &self,
        notebook: &Notebook,
        now: NaiveDateTime,
        interval: Duration,
    ) -> Result<Option<PathBuf>> {
        if self.was_saved_recently(now, interval)? {
            tracing::debug!(name = %self.name, "version archived recently, skipping");
            return Ok(None);
        }
        self.archive(notebook, now).map(Some)
    }

    fn file_stem(&self, at: NaiveDateTime) -> String {
        format!(
            "{}-{}-{:06}",
            self.name,
            at.format(STAMP_FORMAT),
            at.nanosecond() / 1_000
        )
    }

    fn parse_stamp(&self, stem: &str) -> Option<NaiveDateTime> {
        let stamp = stem.strip_prefix(&self.name)?.strip_prefix('-')?;
        let (seconds, micros) = stamp.rsplit_once('-')?;
        if micros.len() != 6 {
            return None;
        }
        let micros: i64 = micros.parse().ok()?;
        let base = NaiveDateTime::parse_from_str(seconds, STAMP_FORMAT).ok()?;
        Some(base + Duration::microseconds(micros))
    }
}
