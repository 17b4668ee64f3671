//! One invocation: resolve, dispatch, install, clean up.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::VersionCatalog;
use crate::context::BuildContext;
use crate::definition::Definition;
use crate::dispatcher::PlatformDispatcher;
use crate::error::BuildError;
use crate::io::cache::ArtifactCache;
use crate::io::checksum::Verifier;
use crate::io::download::{HttpFetcher, select_transport};
use crate::io::tail::LogTail;
use crate::paths::{IpFamily, Settings};
use crate::pipeline::InstallPipeline;
use crate::platform::Platform;
use crate::reporter::Reporter;
use crate::resolver::DefinitionResolver;

/// Lines of the build log included in a failure report.
const REPORT_TAIL_LINES: usize = 10;

/// Version string included in failure reports.
pub const TOOL_VERSION: &str = concat!("vbuild ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub keep_workspace: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub ip_family: IpFamily,
    /// Verbose diagnostics; implies `keep_workspace`.
    pub debug: bool,
}

impl InstallOptions {
    pub fn retains_workspace(&self) -> bool {
        self.keep_workspace || self.debug
    }
}

#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub version_spec: String,
    pub prefix: PathBuf,
    pub options: InstallOptions,
}

/// A successful install.
#[derive(Debug, Clone)]
pub struct Installed {
    pub identifier: String,
    pub prefix: PathBuf,
    pub executable: PathBuf,
    /// Set when the workspace was kept on request.
    pub workspace: Option<PathBuf>,
}

/// What the user sees when an install fails.
#[derive(Debug, Clone, Default)]
pub struct FailureReport {
    pub summary: String,
    pub platform: Option<String>,
    pub tool_version: String,
    pub workspace: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub log_tail: Vec<String>,
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BUILD FAILED ({})", self.summary)?;
        match &self.platform {
            Some(p) => writeln!(f, "  platform: {p}, {}", self.tool_version)?,
            None => writeln!(f, "  {}", self.tool_version)?,
        }
        if let Some(ws) = &self.workspace {
            writeln!(f, "  inspect or clean up the working tree at {}", ws.display())?;
        }
        if let Some(log) = &self.log_path {
            if !self.log_tail.is_empty() {
                writeln!(f, "  results logged to {}", log.display())?;
                writeln!(f)?;
                writeln!(f, "  last {} log lines:", self.log_tail.len())?;
                for line in &self.log_tail {
                    writeln!(f, "  {line}")?;
                }
            }
        }
        Ok(())
    }
}

/// A failed install with its report.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct InstallFailure {
    #[source]
    pub error: BuildError,
    pub report: FailureReport,
}

impl InstallFailure {
    pub fn exit_code(&self) -> i32 {
        self.error.exit_code()
    }

    fn early(error: BuildError) -> Self {
        let report = FailureReport {
            summary: error.to_string(),
            tool_version: TOOL_VERSION.to_string(),
            ..FailureReport::default()
        };
        Self { error, report }
    }
}

/// Install `request.version_spec` into `request.prefix`.
///
/// Nothing under the prefix is created unless a definition resolves, a
/// platform matches and the artifact has been fetched and verified.
///
/// # Errors
///
/// An [`InstallFailure`] carrying the `BuildError` and a report.
pub async fn install(
    request: &InstallRequest,
    settings: &Settings,
    reporter: &dyn Reporter,
) -> Result<Installed, InstallFailure> {
    let opts = &request.options;

    reporter.section("Resolving");
    let resolver = DefinitionResolver::new(
        VersionCatalog::new(settings.definition_dirs.clone()),
        settings.major.clone(),
    );
    let resolved = resolver
        .resolve(&request.version_spec)
        .map_err(InstallFailure::early)?;
    info!("{} -> {}", request.version_spec, resolved.path.display());
    let definition = Definition::from_file(&resolved.path)
        .map_err(|e| InstallFailure::early(e.into()))?;

    let verifier = Verifier::new();
    let transport = select_transport(settings.http_client.as_deref(), opts.ip_family, opts.quiet)
        .map_err(|e| InstallFailure::early(e.into()))?;
    let fetcher = HttpFetcher::new(transport).with_mirror(settings.mirror_url.clone());
    let cache = ArtifactCache::new(settings.cache_dir.clone(), verifier.clone());
    debug!("using {} for downloads", fetcher.transport_name());

    let platform = Platform::detect();
    let mut ctx = BuildContext::create(settings, &request.prefix, opts.retains_workspace())
        .map_err(InstallFailure::early)?;
    let _tail = opts.verbose.then(|| LogTail::spawn(ctx.log.path().to_path_buf()));

    let executable = definition
        .executable
        .clone()
        .unwrap_or_else(|| settings.executable.clone());
    let pipeline = InstallPipeline::new(&fetcher, &cache, &verifier, reporter)
        .with_executable(executable.clone(), definition.verify_args.clone());

    reporter.section("Installing");
    let outcome = run(&definition, &resolved.identifier, &platform, &mut ctx, &pipeline, reporter).await;

    match outcome {
        Ok(()) => {
            let workspace = ctx.finish(true);
            Ok(Installed {
                identifier: resolved.identifier,
                executable: ctx.prefix.join("bin").join(executable),
                prefix: ctx.prefix.clone(),
                workspace,
            })
        }
        Err(error) => {
            ctx.log.append(&format!("error: {error}"));
            reporter.error(&error.to_string());
            let log_tail = ctx.log.tail(REPORT_TAIL_LINES).unwrap_or_default();
            let workspace = ctx.finish(false);
            let report = FailureReport {
                summary: format!("{} {}", resolved.identifier, error),
                platform: Some(platform.to_string()),
                tool_version: TOOL_VERSION.to_string(),
                workspace,
                log_path: Some(ctx.log.path().to_path_buf()),
                log_tail,
            };
            Err(InstallFailure { error, report })
        }
    }
}

async fn run(
    definition: &Definition,
    identifier: &str,
    platform: &Platform,
    ctx: &mut BuildContext,
    pipeline: &InstallPipeline<'_>,
    reporter: &dyn Reporter,
) -> Result<(), BuildError> {
    ctx.ensure_executable_workspace()?;
    ctx.log.append(&format!("{TOOL_VERSION}: installing {identifier} on {platform}"));
    debug!("workspace {}", ctx.build_dir.display());

    PlatformDispatcher::new(platform, reporter)
        .execute(definition, ctx, pipeline)
        .await
}

/// Identifiers visible through `settings`, lowest first.
pub fn list_definitions(settings: &Settings) -> Vec<String> {
    VersionCatalog::new(settings.definition_dirs.clone()).list()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use crate::test_support::{tool_tarball, write_definition};
    use mockito::Server;
    use sha2::{Digest, Sha256};
    use tempfile::{TempDir, tempdir};
    use vbuild_schema::{Arch, Os};

    struct Fixture {
        root: TempDir,
        settings: Settings,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempdir().unwrap();
            let settings = Settings {
                definition_dirs: vec![root.path().join("defs")],
                tmp_dir: root.path().join("tmp"),
                executable: "tool".into(),
                ..Settings::default()
            };
            std::fs::create_dir_all(&settings.tmp_dir).unwrap();
            Self { root, settings }
        }

        fn define(&self, id: &str, os: &str, arch: &str, url: &str, checksum: &str) {
            let body = format!(
                r#"
[[directive]]
kind = "notice"
message = "installing {id}"

[[directive]]
kind = "install"
name = "tool-{id}"
when = {{ os = "{os}", arch = "{arch}" }}
artifact = {{ type = "tarball", url = "{url}", checksum = "{checksum}" }}
"#
            );
            write_definition(&self.root.path().join("defs"), id, &body);
        }

        fn request(&self, spec: &str) -> InstallRequest {
            InstallRequest {
                version_spec: spec.into(),
                prefix: self.root.path().join("prefix"),
                options: InstallOptions::default(),
            }
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bare_minor_installs_latest_patch() {
        let mut server = Server::new_async().await;
        let body = tool_tarball("1.21");
        let sum = hex::encode(Sha256::digest(&body));
        let _m = server
            .mock("GET", "/tool-1.21.0.tar.gz")
            .with_body(body)
            .create_async()
            .await;

        let fx = Fixture::new();
        let url = format!("{}/tool-1.21.0.tar.gz", server.url());
        fx.define(
            "1.21.0",
            Os::current().as_str(),
            Arch::current().as_str(),
            &url,
            &sum,
        );

        let installed = install(&fx.request("21"), &fx.settings, &NullReporter)
            .await
            .unwrap();

        assert_eq!(installed.identifier, "1.21.0");
        assert!(installed.executable.exists());
        assert!(installed.prefix.join("bin/tool1.21").is_file());
        assert!(installed.prefix.join("bin/tool").symlink_metadata().unwrap().is_symlink());
        assert!(installed.workspace.is_none());
        // Workspace and log are gone.
        assert_eq!(std::fs::read_dir(&fx.settings.tmp_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unknown_version_exits_two_without_touching_prefix() {
        let fx = Fixture::new();
        fx.define("1.21.0", "linux", "amd64", "https://example.invalid/x.tar.gz", "");

        let failure = install(&fx.request("1.99.1"), &fx.settings, &NullReporter)
            .await
            .unwrap_err();

        assert_eq!(failure.exit_code(), 2);
        assert!(failure.report.workspace.is_none());
        assert!(!fx.root.path().join("prefix").exists());
        assert_eq!(std::fs::read_dir(&fx.settings.tmp_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn foreign_platform_fails_and_keeps_workspace() {
        let fx = Fixture::new();
        let foreign_os = if Os::current() == Os::Windows { "linux" } else { "windows" };
        fx.define("1.21.0", foreign_os, "amd64", "https://example.invalid/x.tar.gz", "");

        let failure = install(&fx.request("1.21.0"), &fx.settings, &NullReporter)
            .await
            .unwrap_err();

        assert_eq!(failure.exit_code(), 1);
        assert!(matches!(failure.error, BuildError::NoMatchingPlatform { .. }));
        let report = &failure.report;
        assert!(report.workspace.as_ref().is_some_and(|w| w.is_dir()));
        assert!(report.log_tail.iter().any(|l| l.contains("installing 1.21.0")));
        assert!(report.platform.is_some());
        assert!(!fx.root.path().join("prefix").exists());

        let rendered = report.to_string();
        assert!(rendered.starts_with("BUILD FAILED"));
        assert!(rendered.contains(TOOL_VERSION));
    }

    #[test]
    fn debug_implies_keep() {
        let opts = InstallOptions {
            debug: true,
            ..InstallOptions::default()
        };
        assert!(opts.retains_workspace());
        assert!(!InstallOptions::default().retains_workspace());
    }
}
