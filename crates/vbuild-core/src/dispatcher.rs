//! Walks a definition's directives and installs from the first matching one.

use async_trait::async_trait;
use tracing::debug;

use crate::context::BuildContext;
use crate::definition::{Definition, Directive, InstallDirective};
use crate::error::BuildError;
use crate::platform::Platform;
use crate::reporter::Reporter;

/// Executes an install directive once its predicate has matched.
#[async_trait]
pub trait DirectiveRunner: Send + Sync {
    async fn install(&self, directive: &InstallDirective, ctx: &BuildContext) -> Result<(), BuildError>;
}

pub struct PlatformDispatcher<'a> {
    platform: &'a Platform,
    reporter: &'a dyn Reporter,
}

impl<'a> PlatformDispatcher<'a> {
    pub fn new(platform: &'a Platform, reporter: &'a dyn Reporter) -> Self {
        Self { platform, reporter }
    }

    /// Run `definition` in declaration order.
    ///
    /// Notices are always emitted. The first install directive whose
    /// predicate holds marks the context satisfied and is handed to
    /// `runner`; later install directives are skipped.
    ///
    /// # Errors
    ///
    /// Whatever `runner` returns, or `BuildError::NoMatchingPlatform` when no
    /// predicate held.
    pub async fn execute(
        &self,
        definition: &Definition,
        ctx: &mut BuildContext,
        runner: &dyn DirectiveRunner,
    ) -> Result<(), BuildError> {
        for directive in &definition.directives {
            match directive {
                Directive::Notice { message } => {
                    ctx.log.append(message);
                    self.reporter.info(message);
                }
                Directive::Install(install) => {
                    if ctx.install_satisfied {
                        debug!("already satisfied, skipping {}", install.display_name());
                        continue;
                    }
                    if !install.when.matches(self.platform) {
                        debug!(
                            "{} is for {} {}, not {}",
                            install.display_name(),
                            install.when.os,
                            install.when.arch,
                            self.platform
                        );
                        continue;
                    }
                    ctx.install_satisfied = true;
                    ctx.log.append(&format!("installing {}", install.display_name()));
                    runner.install(install, ctx).await?;
                }
            }
        }

        if ctx.install_satisfied {
            Ok(())
        } else {
            Err(BuildError::NoMatchingPlatform {
                os: self.platform.os.to_string(),
                arch: self.platform.arch.to_string(),
            })
        }
    }
}
