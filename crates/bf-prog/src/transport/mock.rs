//! A scripted in-memory [`SerialLink`], for exercising the protocol without a radio

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use super::SerialLink;

#[derive(Debug)]
enum Chunk {
    Data(Vec<u8>),
    Eof,
}

/// Replays queued reply chunks and records everything written to it.
///
/// Each queued chunk is handed out by one or more `read` calls (never merged with the next one),
/// an [`eof`](MockLink::eof) marker makes a single read return 0 and once the queue is empty
/// reads fail with [`ErrorKind::TimedOut`], like an idle serial port.
#[derive(Debug, Default)]
pub struct MockLink {
    chunks: VecDeque<Chunk>,
    written: Vec<u8>,
    writes: Vec<Vec<u8>>,
    read_latency: Duration,
    timeout: Duration,
    fail_writes: bool,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply chunk
    pub fn reply(mut self, data: impl AsRef<[u8]>) -> Self {
        self.push_reply(data);
        self
    }

    pub fn push_reply(&mut self, data: impl AsRef<[u8]>) {
        let data = data.as_ref();
        // an empty chunk would read as end-of-stream
        if !data.is_empty() {
            self.chunks.push_back(Chunk::Data(data.to_vec()));
        }
    }

    /// Queues an end-of-stream marker
    pub fn eof(mut self) -> Self {
        self.chunks.push_back(Chunk::Eof);
        self
    }

    /// Makes every read take `latency`. Reads whose latency exceeds the current timeout
    /// sleep for the timeout and then fail with [`ErrorKind::TimedOut`].
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = latency;
        self
    }

    /// Makes every write fail with [`ErrorKind::TimedOut`]
    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Everything written so far, concatenated
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Every `write` call so far, in order
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Number of reply chunks that have not been consumed yet
    pub fn pending_replies(&self) -> usize {
        self.chunks.len()
    }
}

impl Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if !self.read_latency.is_zero() {
            if self.read_latency > self.timeout {
                std::thread::sleep(self.timeout);
                return Err(ErrorKind::TimedOut.into());
            }
            std::thread::sleep(self.read_latency);
        }

        match self.chunks.front_mut() {
            None => Err(ErrorKind::TimedOut.into()),
            Some(Chunk::Eof) => {
                self.chunks.pop_front();
                Ok(0)
            }
            Some(Chunk::Data(data)) => {
                let len = std::cmp::min(buf.len(), data.len());
                buf[..len].copy_from_slice(&data[..len]);
                data.drain(..len);
                if data.is_empty() {
                    self.chunks.pop_front();
                }
                Ok(len)
            }
        }
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.fail_writes {
            return Err(ErrorKind::TimedOut.into());
        }

        self.written.extend_from_slice(buf);
        self.writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SerialLink for MockLink {
    fn set_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }
}
