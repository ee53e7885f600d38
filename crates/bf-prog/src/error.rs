use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Which half of a [`send_receive`](crate::transport::Transport::send_receive) exchange ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Write,
    Read,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Write => write!(f, "write"),
            Phase::Read => write!(f, "read"),
        }
    }
}

/// Errors produced while talking to the radio.
///
/// None of these are recoverable within a session: the radio has no way to resynchronize,
/// so after any error the connection should be closed and the radio power-cycled.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Short read: expected {expected} bytes, got {received} before the stream closed")]
    ShortRead { expected: usize, received: usize },
    #[error("Timed out during {phase}")]
    Timeout { phase: Phase },
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(Mismatch),
    #[error("Key index {0} is out of range (the key table holds {1} keys)")]
    KeyIndexOutOfRange(usize, usize),
    #[error("Block payload is {actual} bytes, but the block size is {expected}")]
    BlockLength { expected: usize, actual: usize },
    #[error("Data length {len} is not a multiple of the block size {block_size}")]
    UnalignedLength { len: usize, block_size: usize },
    #[error("Block size must be non-zero")]
    InvalidBlockSize,
    #[error("The handshake must complete before any block operation")]
    HandshakeRequired,
    #[error("The handshake has already been performed on this session")]
    HandshakeRepeated,
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("Serial port error")]
    Serial(#[from] serialport::Error),
    #[error("Failed to encode a command")]
    Codec(#[from] binrw::Error),
}

/// What exactly did not match in a block reply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    #[error("wrong read response for block {address:#06x} (header {})", hex::encode(.header))]
    ReadHeader { address: u16, header: [u8; 4] },
    #[error("wrong write response for block {address:#06x} ({response:#04x} instead of ACK)")]
    WriteAck { address: u16, response: u8 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
