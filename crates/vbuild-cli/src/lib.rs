//! vbuild - install a runtime version from a definition
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! ```text
//! vbuild [options] <VERSION> <PREFIX>
//! vbuild --definitions
//! ```
//!
//! Definitions are looked up in `$VBUILD_DEFINITIONS` and then in
//! `<VBUILD_ROOT>/definitions`. Exit codes: 0 success, 1 failure or bad
//! usage, 2 definition not found.

pub mod ui;

use std::path::PathBuf;

use clap::Parser;
use tracing::debug;
use vbuild_core::install::list_definitions;
use vbuild_core::{InstallOptions, InstallRequest, IpFamily, Settings, install};

use crate::ui::ConsoleReporter;

#[derive(Debug, Parser)]
#[command(name = "vbuild")]
#[command(version, about = "Install a runtime version into a prefix directory")]
pub struct Cli {
    /// Version to install (1.21.3, 21, 1.21rc, latest) or a path to a definition
    #[arg(id = "version_spec", value_name = "VERSION", required_unless_present = "definitions")]
    pub version: Option<String>,

    /// Directory to install into
    #[arg(required_unless_present = "definitions")]
    pub prefix: Option<PathBuf>,

    /// List all available definitions and exit
    #[arg(short = 'd', long)]
    pub definitions: bool,

    /// Keep the build workspace after a successful install
    #[arg(short, long, env = "VBUILD_KEEP_BUILD_PATH")]
    pub keep: bool,

    /// Follow the build log while installing
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable download progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Resolve names to IPv4 addresses only
    #[arg(short = '4', long, conflicts_with = "ipv6")]
    pub ipv4: bool,

    /// Resolve names to IPv6 addresses only
    #[arg(short = '6', long)]
    pub ipv6: bool,

    /// Debug build: log every step and keep the workspace
    #[arg(short = 'g', long)]
    pub debug: bool,
}

impl Cli {
    pub fn ip_family(&self) -> IpFamily {
        if self.ipv4 {
            IpFamily::V4
        } else if self.ipv6 {
            IpFamily::V6
        } else {
            IpFamily::Any
        }
    }

    /// Default tracing filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }

    /// The install this invocation asks for, if any.
    pub fn request(&self) -> Option<InstallRequest> {
        Some(InstallRequest {
            version_spec: self.version.clone()?,
            prefix: self.prefix.clone()?,
            options: InstallOptions {
                keep_workspace: self.keep,
                verbose: self.verbose,
                quiet: self.quiet,
                ip_family: self.ip_family(),
                debug: self.debug,
            },
        })
    }
}

/// Run a parsed command line, returning the process exit code.
pub async fn run(cli: &Cli) -> u8 {
    let settings = Settings::from_env();
    debug!("definition search path: {:?}", settings.definition_dirs);

    if cli.definitions {
        for id in list_definitions(&settings) {
            println!("{id}");
        }
        return 0;
    }

    let Some(request) = cli.request() else {
        eprintln!("vbuild: a version and a prefix are required (see --help)");
        return 1;
    };

    let reporter = ConsoleReporter::new(cli.quiet);
    match install(&request, &settings, &reporter).await {
        Ok(installed) => {
            if let Some(ws) = installed.workspace {
                eprintln!("Build workspace kept at {}", ws.display());
            }
            0
        }
        Err(failure) => {
            eprint!("\n{}", failure.report);
            u8::try_from(failure.exit_code()).unwrap_or(1)
        }
    }
}
