//! Follow the build log and re-emit new lines through `tracing`.
//!
//! Purely an observer: it never influences the pipeline and stops when the
//! guard is dropped.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::task::JoinHandle;
use tracing::info;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Aborts the tail task on drop.
pub struct LogTail {
    handle: JoinHandle<()>,
}

impl LogTail {
    /// Start following `path` from its current end.
    pub fn spawn(path: PathBuf) -> Self {
        let handle = tokio::spawn(async move {
            let mut offset = tokio::fs::metadata(&path).await.map_or(0, |m| m.len());
            let mut pending = String::new();
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                let Ok(mut file) = tokio::fs::File::open(&path).await else {
                    continue;
                };
                if file.seek(std::io::SeekFrom::Start(offset)).await.is_err() {
                    continue;
                }
                let mut buf = Vec::new();
                let Ok(n) = file.read_to_end(&mut buf).await else {
                    continue;
                };
                offset += n as u64;
                pending.push_str(&String::from_utf8_lossy(&buf));

                while let Some(idx) = pending.find('\n') {
                    let line: String = pending.drain(..=idx).collect();
                    info!(target: "vbuild::log", "{}", line.trim_end());
                }
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for LogTail {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn tail_stops_when_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("build.log");
        std::fs::write(&path, "").unwrap();

        let tail = LogTail::spawn(path.clone());
        assert!(tail.is_running());
        std::fs::write(&path, "one\ntwo\n").unwrap();
        tokio::time::sleep(POLL_INTERVAL * 2).await;
        assert!(tail.is_running());

        let abort = tail.handle.abort_handle();
        drop(tail);
        for _ in 0..50 {
            if abort.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(abort.is_finished());
    }
}
