use std::io::Cursor;

use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};

use crate::error::Result;

pub const READ_OPCODE: u8 = b'R';
pub const WRITE_OPCODE: u8 = b'W';
pub const ACK: u8 = 0x06;

pub const HEADER_SIZE: usize = 4;

/// The 4-byte header shared by block commands and block read replies
#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, Clone, Copy)]
#[brw(big)]
pub struct BlockHeader {
    pub opcode: u8,
    pub address: u16,
    pub size: u8,
}

impl BlockHeader {
    pub fn read_command(address: u16, size: u8) -> Self {
        Self {
            opcode: READ_OPCODE,
            address,
            size,
        }
    }

    pub fn write_command(address: u16, size: u8) -> Self {
        Self {
            opcode: WRITE_OPCODE,
            address,
            size,
        }
    }

    /// Serializes the header followed by `payload`
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(HEADER_SIZE + payload.len()));
        cursor.write_be(self)?;

        let mut buf = cursor.into_inner();
        buf.extend_from_slice(payload);
        Ok(buf)
    }

    pub fn decode(raw: &[u8; HEADER_SIZE]) -> Result<Self> {
        Ok(Cursor::new(raw).read_be()?)
    }

    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let [hi, lo] = self.address.to_be_bytes();
        [self.opcode, hi, lo, self.size]
    }

    /// Whether this reply header echoes the read command for `address`
    pub fn echoes_read(&self, address: u16) -> bool {
        self.opcode == READ_OPCODE && self.address == address
    }
}
