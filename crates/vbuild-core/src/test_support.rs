//! Shared fixtures for pipeline tests.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::io::download::{FetchError, Transport};
use crate::reporter::Reporter;

/// Number of `get` calls a [`MemoryTransport`] has served.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Serves fixed bodies from memory.
pub struct MemoryTransport {
    bodies: HashMap<String, Vec<u8>>,
    calls: Calls,
}

impl MemoryTransport {
    pub fn serving(url: &str, body: Vec<u8>) -> (Self, Calls) {
        let calls = Calls::default();
        let transport = Self {
            bodies: HashMap::from([(url.to_string(), body)]),
            calls: calls.clone(),
        };
        (transport, calls)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn head(&self, url: &str) -> bool {
        self.bodies.contains_key(url)
    }

    async fn get(&self, url: &str, dest: &Path, _: &dyn Reporter) -> Result<u64, FetchError> {
        self.calls.0.fetch_add(1, Ordering::SeqCst);
        let body = self.bodies.get(url).ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })?;
        fs::write(dest, body)?;
        Ok(body.len() as u64)
    }
}

/// A gzipped tarball holding `tool-<version>/bin/tool<version>`, a shell
/// script that prints its version.
pub fn tool_tarball(version: &str) -> Vec<u8> {
    let gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(gz);

    let script = format!("#!/bin/sh\necho \"tool {version} $1\"\n");
    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    header.set_mtime(0);
    header.set_cksum();
    builder
        .append_data(
            &mut header,
            format!("tool-{version}/bin/tool{version}"),
            script.as_bytes(),
        )
        .unwrap();

    let readme = b"tool\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(readme.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder
        .append_data(&mut header, format!("tool-{version}/README"), &readme[..])
        .unwrap();

    builder.into_inner().unwrap().finish().unwrap()
}

/// Path-sorted view of a tree: file contents, link targets and modes.
pub fn snapshot(root: &Path) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for entry in walkdir::WalkDir::new(root).min_depth(1) {
        let entry = entry.unwrap();
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let meta = fs::symlink_metadata(entry.path()).unwrap();
        let value = if meta.is_symlink() {
            format!("-> {}", fs::read_link(entry.path()).unwrap().display())
        } else if meta.is_dir() {
            "dir".to_string()
        } else {
            let contents = fs::read(entry.path()).unwrap();
            format!("{} bytes {}", contents.len(), hex::encode(&contents))
        };
        #[cfg(unix)]
        let value = {
            use std::os::unix::fs::PermissionsExt;
            format!("{value} {:o}", meta.permissions().mode() & 0o7777)
        };
        out.insert(rel, value);
    }
    out
}

/// Write a definition file into `dir` named `identifier`.
pub fn write_definition(dir: &Path, identifier: &str, body: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(identifier), body).unwrap();
}
