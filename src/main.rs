use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info};

use snyk_bulk_import::artifacts::ArtifactDir;
use snyk_bulk_import::cleanup::{archive, ArchiveKind};
use snyk_bulk_import::credentials;
use snyk_bulk_import::github::GithubClient;
use snyk_bulk_import::importer::SnykApiImport;
use snyk_bulk_import::mapping;
use snyk_bulk_import::matcher::{self, DestinationIndex};
use snyk_bulk_import::pipeline::{self, ImportOptions};
use snyk_bulk_import::snyk::SnykClient;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Match GitHub orgs to Snyk orgs from a CSV mapping and drive a bulk
    /// repository import through snyk-api-import.
    Run(RunArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Tenant {
    #[value(name = "api.snyk.io")]
    Global,
    #[value(name = "api.us.snyk.io")]
    Us,
    #[value(name = "api.eu.snyk.io")]
    Eu,
    #[value(name = "api.au.snyk.io")]
    Au,
}

impl Tenant {
    fn host(self) -> &'static str {
        match self {
            Tenant::Global => "api.snyk.io",
            Tenant::Us => "api.us.snyk.io",
            Tenant::Eu => "api.eu.snyk.io",
            Tenant::Au => "api.au.snyk.io",
        }
    }
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    /// Path to the CSV file containing GitHub organization mappings
    #[arg(long)]
    csv_file_path: PathBuf,

    /// GitHub personal access token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    /// Snyk group ID
    #[arg(long, env = "SNYK_GROUP_ID")]
    group_id: String,

    /// Path to the snyk-api-import executable
    #[arg(long)]
    snyk_api_import_path: PathBuf,

    /// Snyk API tenant hostname
    #[arg(long, value_enum, env = "SNYK_API", default_value = "api.us.snyk.io")]
    snyk_api_tenant: Tenant,

    /// Snyk org used as the template when creating orgs for extra batches
    #[arg(long, env = "SNYK_SOURCE_ORG_ID")]
    snyk_source_org_id: String,

    /// Prefer the GitHub Cloud App integration when an org has one
    #[arg(long, env = "USE_GITHUB_CLOUD_APP_INTEGRATION")]
    use_github_cloud_app_integration: bool,

    /// Directory artifacts are written to and discovered in
    #[arg(long, default_value = ".")]
    artifact_dir: PathBuf,

    /// Maximum number of targets per batch file
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    match args.command {
        Command::Run(run_args) => run(run_args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    credentials::validate_github_token(&args.github_token)?;
    let snyk_token = credentials::snyk_token()?;
    let tenant = args.snyk_api_tenant.host();

    let rows = mapping::read_csv_file(&args.csv_file_path)?;
    info!(rows = rows.len(), "read CSV mapping file");

    let github = GithubClient::new(args.github_token.clone());
    let github_orgs = github
        .list_organizations()
        .await
        .context("error collecting GitHub orgs")?;
    info!(count = github_orgs.len(), "collected GitHub orgs");

    let snyk = SnykClient::new(tenant, snyk_token.clone())?;
    let snyk_orgs = snyk
        .list_group_orgs(&args.group_id)
        .await
        .context("error collecting Snyk orgs")?;
    info!(count = snyk_orgs.len(), "collected Snyk orgs");

    let destination = DestinationIndex::new(&snyk_orgs);
    let matches = matcher::match_orgs(&rows, &github_orgs, &destination);
    info!(count = matches.len(), "matched organizations");

    let artifacts = ArtifactDir::new(&args.artifact_dir);
    pipeline::emit_org_data(&snyk, &artifacts, &matches, &args.group_id)
        .await
        .context("error creating org data files")?;

    let org_data_files = artifacts
        .find_org_data_files()
        .context("error finding org data files")?;

    let importer = SnykApiImport::new(
        &args.snyk_api_import_path,
        &args.artifact_dir,
        snyk_token,
        tenant,
    );
    let opts = ImportOptions {
        group_id: args.group_id.clone(),
        source_org_id: args.snyk_source_org_id.clone(),
        batch_size: args.batch_size,
        prefer_cloud_app: args.use_github_cloud_app_integration,
    };
    // Import failures are contained; cleanup always runs.
    pipeline::import_repos(&snyk, &importer, &artifacts, &org_data_files, &opts).await;

    if let Err(err) = run_cleanup(&artifacts) {
        error!(error = %err, "cleanup failed");
        return Err(err);
    }
    Ok(())
}

fn run_cleanup(artifacts: &ArtifactDir) -> Result<()> {
    let org_data_files = artifacts.find_org_data_files()?;
    archive(artifacts.root(), &org_data_files, ArchiveKind::Json)?;

    let log_files = artifacts.find_log_files()?;
    archive(artifacts.root(), &log_files, ArchiveKind::Log)?;

    let import_files = artifacts.find_batch_import_files()?;
    archive(artifacts.root(), &import_files, ArchiveKind::Import)?;
    Ok(())
}
