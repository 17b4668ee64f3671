//! vbuild core
//!
//! Resolves a version spec to a definition, picks the directive for the
//! host platform, and runs the fetch/verify/extract/install pipeline.
//!
//! ```text
//! DefinitionResolver (VersionCatalog)
//!   -> PlatformDispatcher
//!     -> InstallPipeline (HttpFetcher, ArtifactCache, Verifier)
//! ```

pub mod catalog;
pub mod context;
pub mod definition;
pub mod dispatcher;
pub mod error;
pub mod finalize;
pub mod install;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod platform;
pub mod reporter;
pub mod resolver;

#[cfg(test)]
mod test_support;

pub use error::BuildError;
pub use install::{FailureReport, InstallFailure, InstallOptions, InstallRequest, Installed, install};
pub use paths::{IpFamily, Settings};
pub use reporter::{NullReporter, Reporter};

/// User Agent string for HTTP requests
pub const USER_AGENT: &str = concat!("vbuild/", env!("CARGO_PKG_VERSION"));
