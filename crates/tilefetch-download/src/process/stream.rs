//! Output stream readers (non-UTF8-safe).
//!
//! Download tools redraw their progress bars with bare `\r`, so reading by
//! lines would hold a whole transfer's worth of updates until the final
//! newline. These readers consume raw chunks, cut them at the last `\r` or
//! `\n`, decode lossily, and carry the incomplete tail into the next read.

use std::io;

use tilefetch_core::ProgressSample;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::progress::parse_chunk;

/// Captured stderr keeps at most this many trailing bytes.
pub const STDERR_TAIL_LIMIT: usize = 64 * 1024;

const READ_CHUNK: usize = 4096;

/// Read `stream`, feed complete segments to the progress parser, and
/// return the captured text.
pub fn spawn_progress_reader<R, F>(
    stream: R,
    stream_type: &'static str,
    on_sample: F,
) -> JoinHandle<io::Result<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
    F: Fn(ProgressSample) + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut tail = TailBuffer::new(STDERR_TAIL_LIMIT);
        read_segments(stream, stream_type, |text| {
            tail.push(text);
            for sample in parse_chunk(text) {
                on_sample(sample);
            }
        })
        .await?;
        Ok(tail.into_string())
    })
}

/// Read `stream` to the end and return its (tail-limited) text.
pub fn spawn_capture<R>(stream: R, stream_type: &'static str) -> JoinHandle<io::Result<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut tail = TailBuffer::new(STDERR_TAIL_LIMIT);
        read_segments(stream, stream_type, |text| tail.push(text)).await?;
        Ok(tail.into_string())
    })
}

/// Read `stream` to the end, logging and discarding it. Keeps the child
/// from blocking on a full pipe.
pub fn spawn_drain<R>(stream: R, stream_type: &'static str) -> JoinHandle<io::Result<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        read_segments(stream, stream_type, |text| {
            trace!(%stream_type, "{}", text.trim_end());
        })
        .await?;
        Ok(String::new())
    })
}

async fn read_segments<R, F>(mut stream: R, stream_type: &'static str, mut on_text: F) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut carry: Vec<u8> = Vec::with_capacity(READ_CHUNK);

    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) => break, // EOF
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(%stream_type, error = %e, "stream reader exiting due to read error");
                return Err(e);
            }
        };
        carry.extend_from_slice(&chunk[..n]);

        if let Some(cut) = carry.iter().rposition(|b| *b == b'\n' || *b == b'\r') {
            let rest = carry.split_off(cut + 1);
            on_text(&String::from_utf8_lossy(&carry));
            carry = rest;
        }
    }

    if !carry.is_empty() {
        on_text(&String::from_utf8_lossy(&carry));
    }

    debug!(%stream_type, "stream reader task exiting");
    Ok(())
}

/// Keeps the last `limit` bytes of pushed text.
struct TailBuffer {
    text: String,
    limit: usize,
}

impl TailBuffer {
    const fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
        }
    }

    fn push(&mut self, text: &str) {
        self.text.push_str(text);
        if self.text.len() > self.limit {
            let mut start = self.text.len() - self.limit;
            while !self.text.is_char_boundary(start) {
                start += 1;
            }
            self.text.drain(..start);
        }
    }

    fn into_string(self) -> String {
        self.text
    }
}
