//! Invocation of the external snyk-api-import executable: one subcommand
//! turns an org-data document into a target list, the other performs the
//! actual import.
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

#[derive(Debug, Error)]
pub enum ImporterError {
    #[error("failed to run importer {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of one importer invocation. The exit status is always
/// inspected by the driver; a nonzero exit fails that invocation's batch.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    fn from_output(status: ExitStatus, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[async_trait]
pub trait ImporterRunner: Send + Sync {
    /// `import:data`: consume an org-data document and produce a
    /// target-list file in the working directory.
    async fn define_import_data(
        &self,
        org_data_file: &Path,
        integration_type: &str,
    ) -> Result<ProcessOutcome, ImporterError>;

    /// `import`: consume a target-list (or batch) file and perform the
    /// import.
    async fn import(&self, targets_file: &Path) -> Result<ProcessOutcome, ImporterError>;
}

/// Runs the real snyk-api-import binary with credentials passed through
/// the environment.
pub struct SnykApiImport {
    executable: PathBuf,
    working_dir: PathBuf,
    snyk_token: String,
    api_base: String,
}

impl SnykApiImport {
    pub fn new(
        executable: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
        snyk_token: String,
        tenant: &str,
    ) -> Self {
        Self {
            executable: executable.into(),
            working_dir: working_dir.into(),
            snyk_token,
            api_base: format!("https://{}/v1", tenant),
        }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.current_dir(&self.working_dir)
            .env("SNYK_TOKEN", &self.snyk_token)
            .env("SNYK_API", &self.api_base);
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<ProcessOutcome, ImporterError> {
        let output = cmd.output().await.map_err(|source| ImporterError::Spawn {
            path: self.executable.display().to_string(),
            source,
        })?;
        Ok(ProcessOutcome::from_output(
            output.status,
            output.stdout,
            output.stderr,
        ))
    }
}

#[async_trait]
impl ImporterRunner for SnykApiImport {
    async fn define_import_data(
        &self,
        org_data_file: &Path,
        integration_type: &str,
    ) -> Result<ProcessOutcome, ImporterError> {
        info!(file = %org_data_file.display(), integration_type, "running import:data");
        let mut cmd = self.base_command();
        cmd.arg("import:data")
            .arg(format!("--orgsData={}", org_data_file.display()))
            .arg("--source=github-enterprise")
            .arg(format!("--integrationType={}", integration_type));
        self.run(cmd).await
    }

    async fn import(&self, targets_file: &Path) -> Result<ProcessOutcome, ImporterError> {
        info!(file = %targets_file.display(), "running import");
        let mut cmd = self.base_command();
        cmd.env("DEBUG", "*")
            .arg("import")
            .arg(format!("--file={}", targets_file.display()));
        self.run(cmd).await
    }
}
