//! Artifact files on the shared working directory: org-data documents we
//! write, plus discovery of the files the external importer drops there.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::model::{OrgDataFile, TargetList};

/// File-name prefix of org-data documents (`snyk-created-orgs-{n}.json`).
pub const ORG_DATA_PREFIX: &str = "snyk-created-orgs-";
/// File-name prefix of importer-produced target lists and of the batch
/// files split from them.
pub const IMPORT_TARGETS_PREFIX: &str = "github-enterprise-import-targets";
/// Marker distinguishing our split batch files from the importer's own
/// target-list output.
pub const BATCH_MARKER: &str = "-batch-";

/// Slack applied to the discovery cutoff for filesystems with
/// whole-second mtime granularity.
const MTIME_TOLERANCE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON artifact {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_err(path: &Path, source: serde_json::Error) -> ArtifactError {
    ArtifactError::Json {
        path: path.display().to_string(),
        source,
    }
}

/// An explicit artifact directory. All reads and writes go through this
/// instead of the process working directory, so two runs pointed at
/// different directories cannot see each other's files.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one org-data document as `snyk-created-orgs-{index}.json`.
    pub fn write_org_data(
        &self,
        doc: &OrgDataFile,
        index: usize,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.root.join(format!("{}{}.json", ORG_DATA_PREFIX, index));
        let body = serde_json::to_string_pretty(doc).map_err(|e| json_err(&path, e))?;
        fs::write(&path, body).map_err(|e| io_err(&path, e))?;
        Ok(path)
    }

    pub fn read_org_data(&self, path: &Path) -> Result<OrgDataFile, ArtifactError> {
        let body = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_json::from_str(&body).map_err(|e| json_err(path, e))
    }

    pub fn read_target_list(&self, path: &Path) -> Result<TargetList, ArtifactError> {
        let body = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_json::from_str(&body).map_err(|e| json_err(path, e))
    }

    pub fn write_target_list(
        &self,
        path: &Path,
        list: &TargetList,
    ) -> Result<(), ArtifactError> {
        let body = serde_json::to_string_pretty(list).map_err(|e| json_err(path, e))?;
        fs::write(path, body).map_err(|e| io_err(path, e))
    }

    fn list_files(&self) -> Result<Vec<PathBuf>, ArtifactError> {
        let entries = fs::read_dir(&self.root).map_err(|e| io_err(&self.root, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&self.root, e))?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn files_where(
        &self,
        pred: impl Fn(&str) -> bool,
    ) -> Result<Vec<PathBuf>, ArtifactError> {
        Ok(self
            .list_files()?
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(&pred)
                    .unwrap_or(false)
            })
            .collect())
    }

    /// All org-data documents, sorted by file name.
    pub fn find_org_data_files(&self) -> Result<Vec<PathBuf>, ArtifactError> {
        self.files_where(|name| name.starts_with(ORG_DATA_PREFIX))
    }

    /// Importer process logs left in the artifact directory.
    pub fn find_log_files(&self) -> Result<Vec<PathBuf>, ArtifactError> {
        self.files_where(|name| name.ends_with(".log"))
    }

    /// Target-list artifacts and the batch files split from them.
    pub fn find_batch_import_files(&self) -> Result<Vec<PathBuf>, ArtifactError> {
        self.files_where(|name| name.starts_with(IMPORT_TARGETS_PREFIX))
    }

    /// Newest importer-produced target-list file modified after
    /// `created_after`. Split batch files are never candidates, and stale
    /// target lists from earlier runs are ignored. The cutoff carries a
    /// one-second tolerance: some filesystems truncate mtime to whole
    /// seconds, which would otherwise hide a file written right after the
    /// run started.
    pub fn discover_targets_file(
        &self,
        created_after: SystemTime,
    ) -> Result<Option<PathBuf>, ArtifactError> {
        let candidates = self.files_where(|name| {
            name.starts_with(IMPORT_TARGETS_PREFIX) && !name.contains(BATCH_MARKER)
        })?;

        let cutoff = created_after
            .checked_sub(MTIME_TOLERANCE)
            .unwrap_or(created_after);
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for path in candidates {
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map_err(|e| io_err(&path, e))?;
            if modified <= cutoff {
                continue;
            }
            let newer = match &newest {
                Some((best, _)) => modified > *best,
                None => true,
            };
            if newer {
                newest = Some((modified, path));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }
}
