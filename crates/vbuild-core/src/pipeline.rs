//! Fetch, verify, extract and install one artifact into the prefix.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};
use vbuild_schema::Checksum;

use crate::context::BuildContext;
use crate::definition::{Artifact, InstallDirective};
use crate::dispatcher::DirectiveRunner;
use crate::error::BuildError;
use crate::finalize;
use crate::io::cache::ArtifactCache;
use crate::io::checksum::{Verification, Verifier};
use crate::io::download::{Fetched, HttpFetcher};
use crate::io::{extract, git};
use crate::reporter::Reporter;

/// Arguments used to check the installed executable when a definition
/// does not give any.
pub const DEFAULT_VERIFY_ARGS: &[&str] = &["version"];

pub struct InstallPipeline<'a> {
    fetcher: &'a HttpFetcher,
    cache: &'a ArtifactCache,
    verifier: &'a Verifier,
    reporter: &'a dyn Reporter,
    executable: String,
    verify_args: Vec<String>,
}

impl<'a> InstallPipeline<'a> {
    pub fn new(
        fetcher: &'a HttpFetcher,
        cache: &'a ArtifactCache,
        verifier: &'a Verifier,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            fetcher,
            cache,
            verifier,
            reporter,
            executable: crate::paths::DEFAULT_EXECUTABLE.to_string(),
            verify_args: DEFAULT_VERIFY_ARGS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Executable (under `<prefix>/bin`) checked after install.
    #[must_use]
    pub fn with_executable(mut self, name: impl Into<String>, args: Option<Vec<String>>) -> Self {
        self.executable = name.into();
        if let Some(args) = args {
            self.verify_args = args;
        }
        self
    }

    /// Install `artifact` into `ctx.prefix`.
    ///
    /// The prefix is not touched until the artifact has been acquired,
    /// verified and extracted.
    ///
    /// # Errors
    ///
    /// The first failing step's `BuildError`.
    pub async fn install(&self, name: &str, artifact: &Artifact, ctx: &BuildContext) -> Result<PathBuf, BuildError> {
        // Reject malformed digests before any network traffic.
        let checksum = artifact.checksum()?;

        let tree = match artifact {
            Artifact::Tarball { .. } | Artifact::Zip { .. } => {
                let archive = self.acquire(artifact, checksum.as_ref(), ctx).await?;
                self.reporter.extracting(artifact.filename());
                ctx.log.append(&format!("extracting {}", archive.display()));

                let dest = ctx.build_dir.join("src").join(name);
                if dest.exists() {
                    fs::remove_dir_all(&dest)?;
                }
                let unpack_to = dest.clone();
                tokio::task::spawn_blocking(move || -> Result<(), BuildError> {
                    extract::extract_auto(&archive, &unpack_to)?;
                    extract::strip_components(&unpack_to)?;
                    Ok(())
                })
                .await
                .map_err(std::io::Error::other)??;
                dest
            }
            Artifact::SourceControl {
                repository,
                reference,
            } => {
                let dest = ctx.build_dir.join("src").join(name);
                if dest.exists() {
                    fs::remove_dir_all(&dest)?;
                }
                self.reporter.downloading(artifact.filename(), 0, None);
                git::clone(repository, reference.as_deref(), &dest, &ctx.log).await?;
                let dot_git = dest.join(".git");
                if dot_git.exists() {
                    fs::remove_dir_all(dot_git)?;
                }
                dest
            }
        };

        self.reporter.installing(name, &ctx.prefix);
        ctx.log.append(&format!("installing into {}", ctx.prefix.display()));

        let prefix = ctx.prefix.clone();
        let log = ctx.log.clone();
        let executable = self.executable.clone();
        let args = self.verify_args.clone();
        let exe = tokio::task::spawn_blocking(move || -> Result<PathBuf, BuildError> {
            finalize::copy_dir_all(&tree, &prefix)
                .map_err(|e| BuildError::io_context("copy into prefix", std::io::Error::other(e)))?;
            finalize::normalize_permissions(&prefix)?;
            for link in finalize::create_compat_links(&prefix.join("bin"))? {
                log.append(&format!("linked {}", link.display()));
            }
            finalize::verify_executable(&prefix, &executable, &args, &log)
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!("verified {}", exe.display());
        self.reporter.done(name, &ctx.prefix);
        Ok(exe)
    }

    /// Reuse a local copy or download, verifying before returning.
    async fn acquire(
        &self,
        artifact: &Artifact,
        checksum: Option<&Checksum>,
        ctx: &BuildContext,
    ) -> Result<PathBuf, BuildError> {
        let filename = artifact.filename();
        let expected = checksum.map_or("", Checksum::as_str);

        if let Some(reused) = self.cache.reuse(filename, expected, &ctx.build_dir) {
            self.reporter.reused(filename, reused.path());
            ctx.log.append(&format!("reusing {}", reused.path().display()));
            return Ok(ctx.build_dir.join(filename));
        }

        let dest = ctx.build_dir.join(filename);
        let url = artifact.url();
        ctx.log.append(&format!("fetching {url}"));

        let fetched = self
            .fetcher
            .fetch(url, checksum, &dest, self.verifier, self.reporter)
            .await?;
        if let Fetched::Upstream(Verification::Failed { algorithm, actual }) = fetched {
            fs::remove_file(&dest).ok();
            return Err(BuildError::ChecksumMismatch {
                file: filename.to_string(),
                algorithm,
                expected: expected.to_string(),
                actual,
            });
        }

        if let Err(e) = self.cache.store(filename, &dest) {
            warn!("could not cache {filename}: {e}");
        }
        Ok(dest)
    }
}

#[async_trait]
impl<'a> DirectiveRunner for InstallPipeline<'a> {
    async fn install(&self, directive: &InstallDirective, ctx: &BuildContext) -> Result<(), BuildError> {
        let name = directive.display_name();
        InstallPipeline::install(self, &sanitize(&name), &directive.artifact, ctx)
            .await
            .map(|_| ())
    }
}

/// Directive names become directory names in the workspace.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "artifact".to_string(),
        _ => cleaned,
    }
}
