// src/exec/output.rs

//! Forwarding of container stdout/stderr into a log sink.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Tracing target for container output. The logging setup routes events with
/// this target into the container log file and nowhere else.
pub const CONTAINER_TARGET: &str = "respawner::container";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Receives container output one line at a time.
pub trait LineSink: Send + Sync {
    fn line(&self, pid: u32, stream: OutputStream, line: &str);
}

/// Production sink: emits each line as a `tracing` event on
/// [`CONTAINER_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LineSink for TracingSink {
    fn line(&self, pid: u32, stream: OutputStream, line: &str) {
        info!(target: CONTAINER_TARGET, pid, %stream, "container {}: {}", stream, line);
    }
}

/// Spawn a task that reads `reader` line by line into `sink` until EOF.
///
/// Lines are split on raw `\n` bytes and decoded lossily, so a container
/// writing invalid UTF-8 keeps its pipe drained.
pub fn forward_lines<R>(
    reader: R,
    pid: u32,
    stream: OutputStream,
    sink: Arc<dyn LineSink>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(trim_newline(&buf));
                    sink.line(pid, stream, &line);
                }
                Err(e) => {
                    warn!(pid, %stream, error = %e, "failed to read container output");
                    break;
                }
            }
        }

        debug!(pid, %stream, "container output stream closed");
    })
}

fn trim_newline(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
