mod memory;
mod radio;

use std::path::PathBuf;

use anyhow::Result;
use bf_prog::transport::SerialLink;
use bf_prog::{HandshakeInfo, RadioSession};
use clap::{Args, Parser, Subcommand};

use crate::config::SerialConfig;

/// Read, patch and write the memory of Baofeng radios
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub serial: SerialArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Default)]
pub struct SerialArgs {
    /// Serial port of the programming cable (auto-detected when omitted)
    #[arg(short, long, global = true)]
    pub port: Option<String>,
    #[arg(short, long, global = true)]
    pub baud_rate: Option<u32>,
    /// Read and write timeout
    #[arg(long, global = true, value_name = "MS")]
    pub timeout_ms: Option<u64>,
    #[arg(long, global = true, value_parser = parse_number::<u8>)]
    pub block_size: Option<u8>,
}

impl SerialArgs {
    pub fn as_config(&self) -> SerialConfig {
        SerialConfig {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            timeout_ms: self.timeout_ms,
            block_size: self.block_size,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(flatten)]
    Radio(RadioCommand),
    /// List the serial ports found on this machine
    Ports,
    /// Generate shell completions
    Completions { shell: clap_complete::Shell },
}

/// Commands that talk to the radio, run after a successful handshake
#[derive(Subcommand, Debug)]
pub enum RadioCommand {
    /// Enter programming mode and show what the radio reports about itself
    Info,
    /// Dump a memory region to a file
    Read(ReadOptions),
    /// Upload a file to a memory region
    Write(WriteOptions),
    /// Show a hex dump of a single block
    ReadBlock {
        #[arg(value_parser = parse_number::<u16>)]
        address: u16,
    },
    /// Set the radio type digit in the settings area
    SetRadioType {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=9))]
        radio_type: u8,
    },
}

#[derive(Args, Debug)]
pub struct ReadOptions {
    /// Start address (decimal or 0x-prefixed hex)
    #[arg(value_parser = parse_number::<u16>)]
    pub address: u16,
    /// Number of bytes to read
    #[arg(value_parser = parse_number::<usize>)]
    pub count: usize,
    /// Decrypt the data with this key
    #[arg(short, long)]
    pub key: Option<usize>,
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct WriteOptions {
    /// Start address (decimal or 0x-prefixed hex)
    #[arg(value_parser = parse_number::<u16>)]
    pub address: u16,
    /// Encrypt the data with this key
    #[arg(short, long)]
    pub key: Option<usize>,
    /// File to upload, its size must be a multiple of the block size
    #[arg(short, long)]
    pub input: PathBuf,
}

/// Parses a decimal or `0x`-prefixed hexadecimal number
pub fn parse_number<T: TryFrom<u64>>(s: &str) -> Result<T, String> {
    let s = s.trim().replace('_', "");
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    }
    .map_err(|e| format!("invalid number {:?}: {}", s, e))?;

    T::try_from(value).map_err(|_| format!("{} is out of range", value))
}

impl RadioCommand {
    pub fn run<L: SerialLink>(
        self,
        session: &mut RadioSession<L>,
        handshake: &HandshakeInfo,
    ) -> Result<()> {
        match self {
            RadioCommand::Info => radio::info(handshake)?,
            RadioCommand::Read(options) => memory::read(session, options)?,
            RadioCommand::Write(options) => memory::write(session, options)?,
            RadioCommand::ReadBlock { address } => memory::read_block(session, address)?,
            RadioCommand::SetRadioType { radio_type } => {
                radio::set_radio_type(session, radio_type)?
            }
        }

        Ok(())
    }
}
