//! Integration tests for the vbuild CLI binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Test context with an isolated tool home, definitions and temp root
struct TestContext {
    temp_dir: TempDir,
    definitions: PathBuf,
    tmp: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let definitions = temp_dir.path().join("definitions");
        let tmp = temp_dir.path().join("tmp");
        fs::create_dir_all(&definitions).expect("failed to create definitions dir");
        fs::create_dir_all(&tmp).expect("failed to create tmp dir");
        Self {
            temp_dir,
            definitions,
            tmp,
        }
    }

    fn prefix(&self) -> PathBuf {
        self.temp_dir.path().join("prefix")
    }

    fn define(&self, id: &str, body: &str) {
        fs::write(self.definitions.join(id), body).expect("failed to write definition");
    }

    fn vbuild(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_vbuild"));
        cmd.env("VBUILD_ROOT", self.temp_dir.path().join("root"))
            .env("VBUILD_DEFINITIONS", &self.definitions)
            .env("TMPDIR", &self.tmp)
            .env("VBUILD_EXECUTABLE", "tool")
            .env_remove("VBUILD_CACHE_PATH")
            .env_remove("VBUILD_MIRROR_URL")
            .env_remove("VBUILD_BUILD_PATH")
            .env_remove("VBUILD_KEEP_BUILD_PATH")
            .env_remove("VBUILD_SKIP_MIRROR")
            .env_remove("VBUILD_HTTP_CLIENT")
            .env_remove("VBUILD_MAJOR")
            .env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.vbuild().args(args).output().expect("failed to run vbuild")
    }
}

fn tarball() -> Vec<u8> {
    let gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(gz);
    let script = b"#!/bin/sh\necho tool 1.21.0\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder
        .append_data(&mut header, "tool/bin/tool1.21", &script[..])
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn host_arch() -> &'static str {
    std::env::consts::ARCH
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(false)
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--definitions"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    assert!(ctx.run(&["--version"]).status.success());
}

#[test]
fn test_usage_error_exits_one() {
    let ctx = TestContext::new();
    assert_eq!(ctx.run(&[]).status.code(), Some(1));
    assert_eq!(ctx.run(&["--bogus"]).status.code(), Some(1));
    assert_eq!(
        ctx.run(&["-4", "-6", "1.21.0", "/tmp/x"]).status.code(),
        Some(1)
    );
}

#[test]
fn test_definitions_are_listed_in_semantic_order() {
    let ctx = TestContext::new();
    for id in ["1.10", "1.9.2", "1.21rc1", "1.21.0"] {
        ctx.define(id, "");
    }
    let output = ctx.run(&["--definitions"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let listed: Vec<&str> = stdout.lines().collect();
    assert_eq!(listed, vec!["1.9.2", "1.10", "1.21rc1", "1.21.0"]);
}

#[test]
fn test_missing_definition_exits_two() {
    let ctx = TestContext::new();
    ctx.define("1.21.0", "");
    let prefix = ctx.prefix();

    let output = ctx.run(&["1.99.0", prefix.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    assert!(!prefix.exists());
    assert!(is_empty_dir(&ctx.tmp));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("definition not found: 1.99.0"));
}

#[test]
fn test_invalid_definition_exits_one() {
    let ctx = TestContext::new();
    ctx.define("1.21.0", "this is not = = toml");
    let prefix = ctx.prefix();

    let output = ctx.run(&["1.21.0", prefix.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(!prefix.exists());
}

#[cfg(unix)]
#[test]
fn test_install_bare_minor_end_to_end() {
    use sha2::{Digest, Sha256};

    let mut server = mockito::Server::new();
    let body = tarball();
    let sum = hex::encode(Sha256::digest(&body));
    let _m = server
        .mock("GET", "/tool-1.21.0.tar.gz")
        .with_body(body)
        .create();

    let ctx = TestContext::new();
    ctx.define(
        "1.21.0",
        &format!(
            r#"
[[directive]]
kind = "install"
name = "tool-1.21.0"
when = {{ os = "{}", arch = "{}" }}
artifact = {{ type = "tarball", url = "{}/tool-1.21.0.tar.gz", checksum = "{sum}" }}
"#,
            host_os(),
            host_arch(),
            server.url()
        ),
    );
    let prefix = ctx.prefix();

    let output = ctx.run(&["-q", "21", prefix.to_str().unwrap()]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(prefix.join("bin/tool1.21").is_file());
    assert_eq!(
        fs::read_link(prefix.join("bin/tool")).unwrap(),
        PathBuf::from("tool1.21")
    );
    assert!(is_empty_dir(&ctx.tmp));
}

#[cfg(unix)]
#[test]
fn test_failed_install_reports_and_keeps_workspace() {
    let ctx = TestContext::new();
    ctx.define(
        "1.21.0",
        r#"
[[directive]]
kind = "install"
when = { os = "plan9", arch = "amd64" }
artifact = { type = "tarball", url = "https://example.invalid/tool.tar.gz" }
"#,
    );
    let prefix = ctx.prefix();

    let output = ctx.run(&["1.21.0", prefix.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("BUILD FAILED"));
    assert!(stderr.contains("no installable version found"));
    assert!(stderr.contains("inspect or clean up the working tree"));
    assert!(!prefix.exists());
    assert!(!is_empty_dir(&ctx.tmp));
}
