//! Moves run artifacts into dated, collision-avoiding archive folders.
use chrono::{Local, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("could not create archive directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not move {path} into the archive: {source}")]
    Move {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Json,
    Log,
    Import,
}

impl ArchiveKind {
    pub fn dir_prefix(&self) -> &'static str {
        match self {
            ArchiveKind::Json => "json-files-dir",
            ArchiveKind::Log => "log-files-dir",
            ArchiveKind::Import => "import-files-dir",
        }
    }
}

/// Archive `files` under a `{prefix}-MMDDYYYY` folder in `root`, using
/// today's date.
pub fn archive(
    root: &Path,
    files: &[PathBuf],
    kind: ArchiveKind,
) -> Result<PathBuf, CleanupError> {
    archive_on(root, files, kind, Local::now().date_naive())
}

/// Like [`archive`] but with an explicit date, so the naming policy can be
/// tested without depending on the wall clock.
pub fn archive_on(
    root: &Path,
    files: &[PathBuf],
    kind: ArchiveKind,
    date: NaiveDate,
) -> Result<PathBuf, CleanupError> {
    let base = format!("{}-{}", kind.dir_prefix(), date.format("%m%d%Y"));
    let dir = next_unused_dir(root, &base);
    fs::create_dir_all(&dir).map_err(|source| CleanupError::CreateDir {
        path: dir.display().to_string(),
        source,
    })?;

    for file in files {
        if !file.is_file() {
            warn!(file = %file.display(), "file no longer exists; skipping");
            continue;
        }
        let name = file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        let dest = dir.join(name);
        fs::rename(file, &dest).map_err(|source| CleanupError::Move {
            path: file.display().to_string(),
            source,
        })?;
    }
    info!(dir = %dir.display(), count = files.len(), "archived run artifacts");
    Ok(dir)
}

/// `base` if unused, else `base-run#2`, `base-run#3`, ... until a free
/// name is found. Never reuses an existing folder.
fn next_unused_dir(root: &Path, base: &str) -> PathBuf {
    let candidate = root.join(base);
    if !candidate.exists() {
        return candidate;
    }
    let mut counter = 2u32;
    loop {
        let candidate = root.join(format!("{}-run#{}", base, counter));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
    }

    #[test]
    fn first_run_gets_the_plain_dated_folder() {
        let td = tempdir().unwrap();
        let f = td.path().join("snyk-created-orgs-0.json");
        fs::write(&f, "{}").unwrap();

        let dir = archive_on(td.path(), &[f.clone()], ArchiveKind::Json, date()).unwrap();
        assert_eq!(
            dir.file_name().unwrap().to_str().unwrap(),
            "json-files-dir-03092025"
        );
        assert!(!f.exists());
        assert!(dir.join("snyk-created-orgs-0.json").is_file());
    }

    #[test]
    fn second_run_on_same_day_gets_run_suffix() {
        let td = tempdir().unwrap();
        let first = archive_on(td.path(), &[], ArchiveKind::Log, date()).unwrap();
        let second = archive_on(td.path(), &[], ArchiveKind::Log, date()).unwrap();
        let third = archive_on(td.path(), &[], ArchiveKind::Log, date()).unwrap();
        assert_eq!(
            first.file_name().unwrap().to_str().unwrap(),
            "log-files-dir-03092025"
        );
        assert_eq!(
            second.file_name().unwrap().to_str().unwrap(),
            "log-files-dir-03092025-run#2"
        );
        assert_eq!(
            third.file_name().unwrap().to_str().unwrap(),
            "log-files-dir-03092025-run#3"
        );
    }

    #[test]
    fn missing_files_are_skipped_not_fatal() {
        let td = tempdir().unwrap();
        let present = td.path().join("a.log");
        fs::write(&present, "").unwrap();
        let missing = td.path().join("gone.log");

        let dir = archive_on(
            td.path(),
            &[missing, present.clone()],
            ArchiveKind::Import,
            date(),
        )
        .unwrap();
        assert!(dir.join("a.log").is_file());
        assert!(!present.exists());
    }

    #[test]
    fn kinds_map_to_their_prefixes() {
        assert_eq!(ArchiveKind::Json.dir_prefix(), "json-files-dir");
        assert_eq!(ArchiveKind::Log.dir_prefix(), "log-files-dir");
        assert_eq!(ArchiveKind::Import.dir_prefix(), "import-files-dir");
    }
}
