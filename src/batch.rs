//! Splitting a target list into bounded batches and rewriting batch ids
//! before submission.
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::artifacts::{ArtifactDir, ArtifactError};
use crate::model::{Integrations, TargetList};

pub const GITHUB_ENTERPRISE: &str = "github-enterprise";
pub const GITHUB_CLOUD_APP: &str = "github-cloud-app";

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("org {org_id} has no `{integration}` integration configured")]
    Configuration { org_id: String, integration: String },
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Result of splitting one target-list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutcome {
    /// Batch files in submission order. A list within the batch size is a
    /// single "batch": the input file itself, untouched.
    pub batch_files: Vec<PathBuf>,
    /// Org id of the first target of the first chunk, reported only when
    /// the list was actually split. Batches past the first need their own
    /// org resolved against this reference.
    pub reference_org_id: Option<String>,
}

/// Partition a target-list file into chunks of at most `batch_size`,
/// written as `{stem}-batch-{n}.json` (1-indexed, no gaps).
pub fn split_targets_file(
    dir: &ArtifactDir,
    path: &Path,
    batch_size: usize,
) -> Result<SplitOutcome, BatchError> {
    let list = dir.read_target_list(path)?;
    if list.targets.len() <= batch_size {
        return Ok(SplitOutcome {
            batch_files: vec![path.to_path_buf()],
            reference_org_id: None,
        });
    }

    let reference_org_id = list.targets[0].org_id.clone();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("import-targets");
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut batch_files = Vec::new();
    for (i, chunk) in list.targets.chunks(batch_size).enumerate() {
        let batch_path = parent.join(format!("{}-batch-{}.json", stem, i + 1));
        let batch = TargetList {
            targets: chunk.to_vec(),
        };
        dir.write_target_list(&batch_path, &batch)?;
        batch_files.push(batch_path);
    }
    info!(
        source = %path.display(),
        batches = batch_files.len(),
        "split target list into batches"
    );

    Ok(SplitOutcome {
        batch_files,
        reference_org_id: Some(reference_org_id),
    })
}

/// Pick the integration id to import through. The cloud-app connector is
/// used only when preferred and actually configured on the org; otherwise
/// the enterprise connector is required.
pub fn select_integration<'a>(
    integrations: &'a Integrations,
    org_id: &str,
    prefer_cloud_app: bool,
) -> Result<(&'static str, &'a str), BatchError> {
    if prefer_cloud_app {
        if let Some(id) = integrations.get(GITHUB_CLOUD_APP) {
            return Ok((GITHUB_CLOUD_APP, id));
        }
    }
    integrations
        .get(GITHUB_ENTERPRISE)
        .map(|id| (GITHUB_ENTERPRISE, id.as_str()))
        .ok_or_else(|| BatchError::Configuration {
            org_id: org_id.to_string(),
            integration: GITHUB_ENTERPRISE.to_string(),
        })
}

/// Overwrite every target's org and integration ids in place. Must run
/// before the batch is submitted; idempotent for a given id pair.
pub fn rewrite_batch(
    dir: &ArtifactDir,
    path: &Path,
    org_id: &str,
    integration_id: &str,
) -> Result<(), BatchError> {
    let mut list = dir.read_target_list(path)?;
    for target in &mut list.targets {
        target.org_id = org_id.to_string();
        target.integration_id = integration_id.to_string();
    }
    dir.write_target_list(path, &list)?;
    Ok(())
}
