//! HTTP retrieval over a pluggable transport, with checksum-addressed mirrors.
//!
//! Two transports ship: a streaming `reqwest` client and a `curl` subprocess.
//! Which one is used is decided once, when the [`HttpFetcher`] is built.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use vbuild_schema::Checksum;

use super::checksum::{Verification, Verifier};
use crate::paths::IpFamily;
use crate::reporter::Reporter;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{transport} exited with {code} fetching {url}")]
    Command {
        transport: &'static str,
        url: String,
        code: String,
    },

    #[error("no HTTP transport available (tried {0})")]
    NoTransport(String),
}

/// A backend able to probe and download URLs.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this backend can run on the host.
    fn is_available(&self) -> bool;

    /// Existence probe; never transfers a body. Errors read as `false`.
    async fn head(&self, url: &str) -> bool;

    /// Download `url` to `dest`, returning the number of bytes written.
    async fn get(&self, url: &str, dest: &Path, reporter: &dyn Reporter) -> Result<u64, FetchError>;
}

/// Streaming transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: Client,
    quiet: bool,
}

impl ReqwestTransport {
    /// Build a client restricted to `family`.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the TLS backend cannot be initialised.
    pub fn new(family: IpFamily, quiet: bool) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(crate::USER_AGENT);
        builder = match family {
            IpFamily::Any => builder,
            IpFamily::V4 => builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            IpFamily::V6 => builder.local_address(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
        };
        Ok(Self {
            client: builder.build()?,
            quiet,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn head(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("HEAD {url} failed: {e}");
                false
            }
        }
    }

    async fn get(&self, url: &str, dest: &Path, reporter: &dyn Reporter) -> Result<u64, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let label = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let total = response.content_length();

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        if !self.quiet {
            reporter.downloading(&label, 0, total);
        }
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if !self.quiet {
                reporter.downloading(&label, downloaded, total);
            }
        }
        file.flush().await?;

        Ok(downloaded)
    }
}

/// Fallback transport shelling out to `curl`.
pub struct CurlTransport {
    family: IpFamily,
}

impl CurlTransport {
    pub fn new(family: IpFamily) -> Self {
        Self { family }
    }

    fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("curl");
        cmd.args(["-q", "-fsSL"])
            .arg("--user-agent")
            .arg(crate::USER_AGENT);
        match self.family {
            IpFamily::Any => {}
            IpFamily::V4 => {
                cmd.arg("-4");
            }
            IpFamily::V6 => {
                cmd.arg("-6");
            }
        }
        cmd.stdin(Stdio::null());
        cmd
    }
}

#[async_trait]
impl Transport for CurlTransport {
    fn name(&self) -> &'static str {
        "curl"
    }

    fn is_available(&self) -> bool {
        which::which("curl").is_ok()
    }

    async fn head(&self, url: &str) -> bool {
        let status = self
            .command()
            .arg("-I")
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        status.is_ok_and(|s| s.success())
    }

    async fn get(&self, url: &str, dest: &Path, _reporter: &dyn Reporter) -> Result<u64, FetchError> {
        let output = self
            .command()
            .arg("-o")
            .arg(dest)
            .arg(url)
            .stdout(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("curl: {}", stderr.trim());
            return Err(FetchError::Command {
                transport: "curl",
                url: url.to_string(),
                code: output
                    .status
                    .code()
                    .map_or_else(|| "a signal".to_string(), |c| c.to_string()),
            });
        }

        Ok(tokio::fs::metadata(dest).await?.len())
    }
}

/// Pick the first available transport, honouring `preference` when it is available.
///
/// # Errors
///
/// Returns `FetchError::NoTransport` if no backend can run on this host.
pub fn select_transport(
    preference: Option<&str>,
    family: IpFamily,
    quiet: bool,
) -> Result<Box<dyn Transport>, FetchError> {
    let candidates: Vec<Box<dyn Transport>> = vec![
        Box::new(ReqwestTransport::new(family, quiet)?),
        Box::new(CurlTransport::new(family)),
    ];
    let names: Vec<&str> = candidates.iter().map(|t| t.name()).collect();
    let tried = names.join(", ");

    let mut available: Vec<Box<dyn Transport>> =
        candidates.into_iter().filter(|t| t.is_available()).collect();

    if let Some(wanted) = preference {
        if let Some(pos) = available.iter().position(|t| t.name() == wanted) {
            return Ok(available.swap_remove(pos));
        }
        warn!("HTTP client '{wanted}' is not available, using the default");
    }

    available
        .into_iter()
        .next()
        .ok_or(FetchError::NoTransport(tried))
}

/// Outcome of [`HttpFetcher::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// Downloaded from the mirror and verified.
    Mirror,
    /// Downloaded from upstream; carries the verification result.
    Upstream(Verification),
}

pub struct HttpFetcher {
    transport: Box<dyn Transport>,
    mirror: Option<String>,
}

impl HttpFetcher {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            mirror: None,
        }
    }

    /// Use a checksum-addressed mirror at `base`.
    #[must_use]
    pub fn with_mirror(mut self, base: Option<String>) -> Self {
        self.mirror = base.map(|b| b.trim_end_matches('/').to_string());
        self
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub async fn head(&self, url: &str) -> bool {
        self.transport.head(url).await
    }

    /// Download `url` to `dest`. A partial file is removed on failure.
    ///
    /// # Errors
    ///
    /// Any transport failure, as `FetchError`.
    pub async fn get(&self, url: &str, dest: &Path, reporter: &dyn Reporter) -> Result<u64, FetchError> {
        debug!("GET {url} via {}", self.transport.name());
        match self.transport.get(url, dest, reporter).await {
            Ok(n) => Ok(n),
            Err(e) => {
                tokio::fs::remove_file(dest).await.ok();
                Err(e)
            }
        }
    }

    /// Mirror location for a digest, if mirrors may be used for it.
    pub fn mirror_url(&self, checksum: Option<&Checksum>, verifier: &Verifier) -> Option<String> {
        let base = self.mirror.as_deref()?;
        let checksum = checksum?;
        if !verifier.supports_mirrors() {
            return None;
        }
        Some(format!("{base}/{checksum}"))
    }

    /// Download an artifact, preferring the mirror and verifying the result.
    ///
    /// The mirror is only tried when it answers a HEAD probe; if its copy
    /// fails to download or verify, upstream is used instead. The upstream
    /// copy's verification result is returned for the caller to judge.
    ///
    /// # Errors
    ///
    /// Returns a `FetchError` if the upstream download fails.
    pub async fn fetch(
        &self,
        url: &str,
        checksum: Option<&Checksum>,
        dest: &Path,
        verifier: &Verifier,
        reporter: &dyn Reporter,
    ) -> Result<Fetched, FetchError> {
        if let Some(mirror) = self.mirror_url(checksum, verifier) {
            if self.head(&mirror).await {
                match self.get(&mirror, dest, reporter).await {
                    Ok(_) => {
                        let verified = checksum.map(|c| verifier.verify_checksum(dest, c));
                        if verified.is_none_or(|v| v.is_ok()) {
                            return Ok(Fetched::Mirror);
                        }
                        info!("Mirror copy failed verification, falling back to upstream: {url}");
                        tokio::fs::remove_file(dest).await.ok();
                    }
                    Err(e) => info!("Mirror download failed ({e}), falling back to upstream: {url}"),
                }
            } else {
                info!("Mirror does not have {mirror}, falling back to upstream: {url}");
            }
        }

        self.get(url, dest, reporter).await?;
        let verified = checksum.map_or(Verification::Skipped, |c| verifier.verify_checksum(dest, c));
        Ok(Fetched::Upstream(verified))
    }
}
