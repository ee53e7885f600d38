//! Reading and writing the memory of Baofeng-style radios over their serial programming protocol.
//!
//! ```no_run
//! use bf_prog::transport::{Transport, TransportConfig};
//! use bf_prog::RadioSession;
//!
//! # fn main() -> bf_prog::Result<()> {
//! let transport = Transport::open("/dev/ttyUSB0", &TransportConfig::default())?;
//! let mut session = RadioSession::new(transport);
//! session.handshake()?;
//! let settings = session.read_memory(None, 0xF000, 0x1000)?;
//! # Ok(())
//! # }
//! ```

pub mod crypt;
pub mod device;
mod error;
pub mod transport;

pub use device::{HandshakeInfo, RadioSession};
pub use error::{Error, Mismatch, Phase, Result};
