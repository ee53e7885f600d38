mod command;
mod handshake;

pub use command::{ACK, HEADER_SIZE};
pub use handshake::{HandshakeInfo, HANDSHAKE, IDENT_LEN, MODEL_LEN};

use indicatif::ProgressStyle;
use serialport::SerialPort;
use tracing::{debug, info, instrument, Level, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::crypt;
use crate::error::{Error, Mismatch, Result};
use crate::transport::{SerialLink, Transport};
use command::BlockHeader;

pub const DEFAULT_BLOCK_SIZE: u8 = 0x40;

/// Addresses wrap past this, so no transfer needs more up front
const ADDRESS_SPACE: usize = u16::MAX as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Connected,
    /// A handshake was attempted and did not complete; the radio is in an unknown state
    Failed,
    Programming,
}

/// A programming session with a radio.
///
/// Owns the transport (and thus the port): dropping the session closes the connection.
pub struct RadioSession<L = Box<dyn SerialPort>> {
    transport: Transport<L>,
    block_size: u8,
    state: State,
}

fn progressbar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{span_child_prefix}{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

impl<L: SerialLink> RadioSession<L> {
    pub fn new(transport: Transport<L>) -> Self {
        Self {
            transport,
            block_size: DEFAULT_BLOCK_SIZE,
            state: State::Connected,
        }
    }

    /// Uses a non-default block size for the whole session
    pub fn with_block_size(transport: Transport<L>, block_size: u8) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidBlockSize);
        }

        Ok(Self {
            block_size,
            ..Self::new(transport)
        })
    }

    pub fn block_size(&self) -> u8 {
        self.block_size
    }

    pub fn transport(&self) -> &Transport<L> {
        &self.transport
    }

    /// Ends the session, handing back the transport
    pub fn close(self) -> Transport<L> {
        self.transport
    }

    /// Puts the radio into programming mode. Must be called exactly once, before anything else.
    #[instrument(skip(self), level = Level::DEBUG)]
    pub fn handshake(&mut self) -> Result<HandshakeInfo> {
        if self.state != State::Connected {
            return Err(Error::HandshakeRepeated);
        }

        info!("Entering programming mode...");
        self.state = State::Failed;

        let mut replies = Vec::with_capacity(HANDSHAKE.len());
        for (step, &(outbound, expected_len)) in HANDSHAKE.iter().enumerate() {
            let reply = self.transport.send_receive(outbound, expected_len)?;
            debug!(
                "Handshake step {}: sent {:?}, got {}",
                step + 1,
                String::from_utf8_lossy(&outbound[..outbound.len().min(4)]),
                hex::encode(&reply)
            );
            replies.push(reply);
        }

        // send_receive always returns exactly the requested length
        let info = HandshakeInfo::from_replies(&replies).ok_or(Error::ShortRead {
            expected: HANDSHAKE.iter().map(|(_, len)| len).sum(),
            received: replies.iter().map(Vec::len).sum(),
        })?;
        self.state = State::Programming;

        info!("Radio model: {}", info.model_text().trim_end());

        Ok(info)
    }

    fn ensure_programming(&self) -> Result<()> {
        match self.state {
            State::Programming => Ok(()),
            State::Connected | State::Failed => Err(Error::HandshakeRequired),
        }
    }

    /// Reads one block at `address`, returning its payload
    #[instrument(skip(self), fields(address = %format!("{:#06x}", address)), level = Level::DEBUG)]
    pub fn read_block(&mut self, address: u16) -> Result<Vec<u8>> {
        self.ensure_programming()?;

        let command = BlockHeader::read_command(address, self.block_size).encode(&[])?;
        let mut reply = self
            .transport
            .send_receive(&command, HEADER_SIZE + self.block_size as usize)?;

        let mut raw_header = [0u8; HEADER_SIZE];
        raw_header.copy_from_slice(&reply[..HEADER_SIZE]);
        let header = BlockHeader::decode(&raw_header)?;

        if !header.echoes_read(address) {
            return Err(Error::ProtocolMismatch(Mismatch::ReadHeader {
                address,
                header: header.to_bytes(),
            }));
        }

        Ok(reply.split_off(HEADER_SIZE))
    }

    /// Writes one block at `address`. `data` must be exactly one block long.
    #[instrument(skip(self, data), fields(address = %format!("{:#06x}", address)), level = Level::DEBUG)]
    pub fn write_block(&mut self, address: u16, data: &[u8]) -> Result<()> {
        self.ensure_programming()?;

        if data.len() != self.block_size as usize {
            return Err(Error::BlockLength {
                expected: self.block_size as usize,
                actual: data.len(),
            });
        }

        let command = BlockHeader::write_command(address, self.block_size).encode(data)?;
        let reply = self.transport.send_receive(&command, 1)?;

        match reply.as_slice() {
            [ACK] => Ok(()),
            &[response, ..] => Err(Error::ProtocolMismatch(Mismatch::WriteAck {
                address,
                response,
            })),
            [] => Err(Error::ShortRead {
                expected: 1,
                received: 0,
            }),
        }
    }

    /// Reads `count` bytes starting at `address`, de-obfuscating every block with `key` if given.
    ///
    /// Whole blocks are always read; the tail of the last one is dropped. Addresses wrap around
    /// at 64 KiB.
    #[instrument(skip(self), fields(address = %format!("{:#06x}", address)))]
    pub fn read_memory(
        &mut self,
        key: Option<usize>,
        address: u16,
        count: usize,
    ) -> Result<Vec<u8>> {
        self.ensure_programming()?;
        if let Some(key) = key {
            crypt::key(key)?;
        }

        let span = Span::current();
        span.pb_set_style(&progressbar_style());
        span.pb_set_length(count as u64);

        let mut result = Vec::with_capacity(count.min(ADDRESS_SPACE));
        let mut address = address;

        while result.len() < count {
            let mut block = self.read_block(address)?;
            if let Some(key) = key {
                crypt::crypt_in_place(&mut block, key)?;
            }

            let take = std::cmp::min(block.len(), count - result.len());
            result.extend_from_slice(&block[..take]);
            span.pb_inc(take as u64);

            address = address.wrapping_add(self.block_size as u16);
        }

        Ok(result)
    }

    /// Writes `data` starting at `address`, obfuscating every block with `key` if given.
    ///
    /// `data` must be a whole number of blocks: a partial block is rejected up front instead of
    /// being padded, since padding would clobber memory past the end of `data`.
    #[instrument(skip(self, data), fields(address = %format!("{:#06x}", address), len = data.len()))]
    pub fn write_memory(&mut self, key: Option<usize>, address: u16, data: &[u8]) -> Result<()> {
        self.ensure_programming()?;
        if let Some(key) = key {
            crypt::key(key)?;
        }

        let block_size = self.block_size as usize;
        if data.len() % block_size != 0 {
            return Err(Error::UnalignedLength {
                len: data.len(),
                block_size,
            });
        }

        let span = Span::current();
        span.pb_set_style(&progressbar_style());
        span.pb_set_length(data.len() as u64);

        let mut address = address;
        for chunk in data.chunks_exact(block_size) {
            let block = match key {
                Some(key) => crypt::crypt(chunk, key)?,
                None => chunk.to_vec(),
            };

            self.write_block(address, &block)?;
            span.pb_inc(block_size as u64);

            address = address.wrapping_add(self.block_size as u16);
        }

        Ok(())
    }

    /// See [`crypt::crypt`]
    pub fn crypt(&self, data: &[u8], key: usize) -> Result<Vec<u8>> {
        crypt::crypt(data, key)
    }
}
