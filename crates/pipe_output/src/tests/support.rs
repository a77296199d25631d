use std::fs as std_fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

use crate::Record;

pub(super) fn write_executable(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    std_fs::write(&path, script).unwrap();
    let mut perms = std_fs::metadata(&path).unwrap().permissions();
    #[cfg(unix)]
    {
        perms.set_mode(0o755);
    }
    std_fs::set_permissions(&path, perms).unwrap();
    path
}

/// Fake subprocess that copies its stdin into the file named by its first argument.
pub(super) fn write_capture_script(dir: &Path) -> PathBuf {
    write_executable(dir, "capture", "#!/bin/sh\ncat > \"$1\"\n")
}

/// Record that counts how often records sharing its counter were recycled.
#[derive(Debug)]
pub(super) struct CountingRecord {
    payload: Vec<u8>,
    recycled: Arc<AtomicUsize>,
}

impl CountingRecord {
    pub(super) fn new(payload: &[u8], recycled: &Arc<AtomicUsize>) -> Self {
        Self {
            payload: payload.to_vec(),
            recycled: Arc::clone(recycled),
        }
    }
}

impl Record for CountingRecord {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn recycle(self) {
        self.recycled.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory writer with knobs for partial and failing writes.
#[derive(Debug, Default)]
pub(super) struct ScriptedWriter {
    pub(super) written: Vec<u8>,
    pub(super) calls: usize,
    /// Accept at most this many bytes per call.
    pub(super) max_per_write: Option<usize>,
    /// Fail the call with this 0-based index.
    pub(super) fail_on_call: Option<usize>,
    /// Calls (0-based) that accept nothing and return `Ok(0)`.
    pub(super) stall_on_calls: Vec<usize>,
    /// Snapshot of a recycle counter taken on every call.
    pub(super) recycle_snapshots: Option<(Arc<AtomicUsize>, Arc<Mutex<Vec<usize>>>)>,
}

impl AsyncWrite for ScriptedWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let call = self.calls;
        self.calls += 1;
        if let Some((counter, seen)) = &self.recycle_snapshots {
            seen.lock().unwrap().push(counter.load(Ordering::SeqCst));
        }
        if self.fail_on_call == Some(call) {
            return Poll::Ready(Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe)));
        }
        if self.stall_on_calls.contains(&call) {
            return Poll::Ready(Ok(0));
        }
        let n = self.max_per_write.map_or(buf.len(), |max| buf.len().min(max));
        self.written.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
