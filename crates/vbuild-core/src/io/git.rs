//! Shallow source-control checkouts via the `git` binary.

use std::path::Path;

use tracing::debug;

use super::download::FetchError;
use crate::context::BuildLog;

/// `git clone --depth 1 [--branch <reference>] <repository> <dest>`.
///
/// Output goes to the build log.
///
/// # Errors
///
/// Returns `FetchError::Io` if git cannot be spawned and
/// `FetchError::Command` if it exits unsuccessfully.
pub async fn clone(
    repository: &str,
    reference: Option<&str>,
    dest: &Path,
    log: &BuildLog,
) -> Result<(), FetchError> {
    let mut cmd = tokio::process::Command::new("git");
    cmd.args(["clone", "--depth", "1"]);
    if let Some(reference) = reference {
        cmd.arg("--branch").arg(reference);
    }
    cmd.arg(repository).arg(dest);

    let (stdout, stderr) = log.stdio()?;
    log.append(&format!("git clone {repository} {}", dest.display()));
    debug!("cloning {repository} into {}", dest.display());

    let status = cmd.stdout(stdout).stderr(stderr).status().await?;
    if !status.success() {
        return Err(FetchError::Command {
            transport: "git",
            url: repository.to_string(),
            code: status
                .code()
                .map_or_else(|| "a signal".to_string(), |c| c.to_string()),
        });
    }
    Ok(())
}
