//! The import driver: org-data emission, then per-file define/split/
//! resolve/rewrite/import sequencing.
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, instrument, warn};

use crate::artifacts::ArtifactDir;
use crate::batch;
use crate::importer::ImporterRunner;
use crate::model::{OrgDataFile, OrgImportData, OrgMatch};
use crate::resolver::resolve_batch_org;
use crate::snyk::SnykApi;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub group_id: String,
    pub source_org_id: String,
    pub batch_size: usize,
    pub prefer_cloud_app: bool,
}

/// Fetch integrations for each match and write one org-data document per
/// match, numbered by match position. Any failure here is fatal to the
/// run.
#[instrument(skip_all)]
pub async fn emit_org_data(
    snyk: &dyn SnykApi,
    artifacts: &ArtifactDir,
    matches: &[OrgMatch],
    group_id: &str,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for (index, m) in matches.iter().enumerate() {
        let integrations = snyk
            .org_integrations(&m.snyk_org_id)
            .await
            .with_context(|| {
                format!("failed to fetch integrations for org {}", m.snyk_org_id)
            })?;
        let doc = OrgDataFile {
            org_data: vec![OrgImportData {
                name: m.github_org_name.clone(),
                org_id: m.snyk_org_id.clone(),
                integrations,
                group_id: group_id.to_string(),
            }],
        };
        let path = artifacts.write_org_data(&doc, index)?;
        files.push(path);
    }
    info!(count = files.len(), "wrote org data files");
    Ok(files)
}

/// Drive the importer over every org-data file, strictly sequentially.
/// A failure on one source file is logged and later files still run; the
/// caller proceeds to cleanup either way.
#[instrument(skip_all)]
pub async fn import_repos(
    snyk: &dyn SnykApi,
    importer: &dyn ImporterRunner,
    artifacts: &ArtifactDir,
    org_data_files: &[PathBuf],
    opts: &ImportOptions,
) {
    for file in org_data_files {
        if let Err(err) = process_org_data_file(snyk, importer, artifacts, file, opts).await
        {
            warn!(
                error = %err,
                file = %file.display(),
                "import failed for org data file; continuing with next file"
            );
        }
    }
}

/// One source file through the whole state machine: define import data,
/// discover the produced target list, split, then submit batches in
/// order. Batches past the first get an org resolved and their ids
/// rewritten before submission.
async fn process_org_data_file(
    snyk: &dyn SnykApi,
    importer: &dyn ImporterRunner,
    artifacts: &ArtifactDir,
    file: &Path,
    opts: &ImportOptions,
) -> Result<()> {
    let doc = artifacts.read_org_data(file)?;
    let entry = doc
        .org_data
        .first()
        .ok_or_else(|| anyhow!("org data file {} has no entries", file.display()))?;
    let (integration_type, _) = batch::select_integration(
        &entry.integrations,
        &entry.org_id,
        opts.prefer_cloud_app,
    )?;

    let run_start = SystemTime::now();
    let outcome = importer.define_import_data(file, integration_type).await?;
    if !outcome.success() {
        return Err(anyhow!(
            "import:data exited with status {:?}: {}",
            outcome.code,
            outcome.stderr.trim()
        ));
    }

    let targets_file = match artifacts.discover_targets_file(run_start)? {
        Some(path) => path,
        None => {
            warn!(
                file = %file.display(),
                "importer produced no target list; skipping this org data file"
            );
            return Ok(());
        }
    };

    let split = batch::split_targets_file(artifacts, &targets_file, opts.batch_size)?;

    let Some(reference_org_id) = split.reference_org_id else {
        // Small list: submit the file the importer produced, unmodified.
        return submit_batch(importer, &split.batch_files[0]).await;
    };

    let roster = snyk.list_orgs(&opts.group_id).await?;
    let reference = roster
        .into_iter()
        .find(|org| org.id == reference_org_id)
        .ok_or_else(|| {
            anyhow!(
                "reference org {} not found in group {}",
                reference_org_id,
                opts.group_id
            )
        })?;

    for (index, batch_file) in split.batch_files.iter().enumerate() {
        // Batch 1 already carries the reference org's ids.
        if index == 0 {
            if let Err(err) = submit_batch(importer, batch_file).await {
                warn!(error = %err, batch = 1, "batch import failed; continuing");
            }
            continue;
        }

        let batch_number = (index + 1) as u32;
        let org = resolve_batch_org(
            snyk,
            &reference,
            batch_number,
            &opts.source_org_id,
            &opts.group_id,
        )
        .await
        .with_context(|| format!("could not resolve an org for batch {}", batch_number))?;

        let integrations = snyk.org_integrations(&org.id).await?;
        let integration_id = match batch::select_integration(
            &integrations,
            &org.id,
            opts.prefer_cloud_app,
        ) {
            Ok((_, id)) => id.to_string(),
            Err(err) => {
                warn!(error = %err, batch = batch_number, "skipping batch");
                continue;
            }
        };

        batch::rewrite_batch(artifacts, batch_file, &org.id, &integration_id)?;
        if let Err(err) = submit_batch(importer, batch_file).await {
            warn!(error = %err, batch = batch_number, "batch import failed; continuing");
        }
    }
    Ok(())
}

async fn submit_batch(importer: &dyn ImporterRunner, file: &Path) -> Result<()> {
    let outcome = importer.import(file).await?;
    if !outcome.success() {
        return Err(anyhow!(
            "import of {} exited with status {:?}: {}",
            file.display(),
            outcome.code,
            outcome.stderr.trim()
        ));
    }
    Ok(())
}
