//! This module provides the raw byte exchange with the radio. It knows nothing about the protocol
//! itself: a [`Transport`] writes a command and waits for an exact number of reply bytes.

pub mod mock;

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, instrument, trace};

use crate::error::{Error, Phase, Result};

pub const DEFAULT_BAUD_RATE: u32 = 115200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// A connected byte stream with an adjustable timeout, usually a serial port
pub trait SerialLink: Read + Write {
    /// Sets the timeout applied to subsequent reads and writes
    fn set_timeout(&mut self, timeout: Duration) -> std::io::Result<()>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn set_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        SerialPort::set_timeout(self.as_mut(), timeout).map_err(std::io::Error::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub baud_rate: u32,
    /// Deadline for receiving a whole reply
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct Transport<L = Box<dyn SerialPort>> {
    link: L,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl Transport {
    /// Opens the serial port at `path` (8N1, no flow control) and drops any stale input
    #[instrument(skip(config), fields(baud_rate = config.baud_rate))]
    pub fn open(path: &str, config: &TransportConfig) -> Result<Self> {
        debug!("Opening serial port");

        let port = serialport::new(path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()?;

        port.clear(ClearBuffer::Input)?;

        Ok(Self::new(port, config))
    }
}

impl<L: SerialLink> Transport<L> {
    pub fn new(link: L, config: &TransportConfig) -> Self {
        Self {
            link,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Releases the underlying link
    pub fn into_inner(self) -> L {
        self.link
    }

    /// Sends `data` in full, then reads exactly `expected_len` reply bytes.
    ///
    /// The read timeout bounds the whole reply, not each individual read. Nothing is retried: a
    /// read that returns no bytes fails with [`Error::ShortRead`], an elapsed deadline with
    /// [`Error::Timeout`].
    pub fn send_receive(&mut self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        self.send(data)?;
        self.receive(expected_len)
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        trace!("TX: {}", hex::encode(data));

        self.link.set_timeout(self.write_timeout)?;
        self.link
            .write_all(data)
            .and_then(|()| self.link.flush())
            .map_err(|e| map_io_error(e, Phase::Write))
    }

    fn receive(&mut self, expected_len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; expected_len];
        let mut offset = 0;
        let deadline = Instant::now() + self.read_timeout;

        while offset < expected_len {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(
                    "Read deadline elapsed after {} of {} bytes",
                    offset, expected_len
                );
                return Err(Error::Timeout { phase: Phase::Read });
            }
            self.link.set_timeout(remaining)?;

            match self.link.read(&mut buffer[offset..]) {
                Ok(0) => {
                    return Err(Error::ShortRead {
                        expected: expected_len,
                        received: offset,
                    })
                }
                Ok(n) => offset += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io_error(e, Phase::Read)),
            }
        }

        trace!("RX: {}", hex::encode(&buffer));

        Ok(buffer)
    }
}

fn map_io_error(error: std::io::Error, phase: Phase) -> Error {
    match error.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => Error::Timeout { phase },
        _ => Error::Io(error),
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockLink;
    use super::*;

    fn transport(link: MockLink) -> Transport<MockLink> {
        Transport::new(link, &TransportConfig::default())
    }

    #[test]
    fn accumulates_partial_reads() {
        let link = MockLink::new().reply(b"ab").reply(b"c").reply(b"de");
        let mut transport = transport(link);

        let reply = transport.send_receive(b"hello", 5).unwrap();

        assert_eq!(reply, b"abcde");
        assert_eq!(transport.link().written(), b"hello");
    }

    #[test]
    fn zero_length_read_is_a_short_read() {
        let link = MockLink::new().reply(b"ab").eof();
        let mut transport = transport(link);

        let err = transport.send_receive(b"x", 4).unwrap_err();

        assert!(matches!(
            err,
            Error::ShortRead {
                expected: 4,
                received: 2
            }
        ));
    }

    #[test]
    fn missing_reply_times_out() {
        let link = MockLink::new().reply(b"abc");
        let mut transport = transport(link);

        let err = transport.send_receive(b"x", 4).unwrap_err();

        assert!(matches!(err, Error::Timeout { phase: Phase::Read }));
    }

    #[test]
    fn deadline_covers_the_whole_reply() {
        let config = TransportConfig {
            read_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        // every chunk arrives well within a per-read timeout, but together they take too long
        let link = MockLink::new()
            .with_read_latency(Duration::from_millis(40))
            .reply(b"a")
            .reply(b"b")
            .reply(b"c")
            .reply(b"d");
        let mut transport = Transport::new(link, &config);

        let err = transport.send_receive(b"x", 4).unwrap_err();

        assert!(matches!(err, Error::Timeout { phase: Phase::Read }));
    }

    #[test]
    fn write_failure_is_reported() {
        let link = MockLink::new().fail_writes();
        let mut transport = transport(link);

        let err = transport.send_receive(b"x", 1).unwrap_err();

        assert!(matches!(err, Error::Timeout { phase: Phase::Write }));
    }

    #[test]
    fn empty_reply_reads_nothing() {
        let mut transport = transport(MockLink::new());

        let reply = transport.send_receive(b"x", 0).unwrap();

        assert!(reply.is_empty());
    }
}
