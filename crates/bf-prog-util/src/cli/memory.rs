use anyhow::{Context, Result};
use bf_prog::transport::SerialLink;
use bf_prog::RadioSession;
use itertools::Itertools;
use tracing::info;

use super::{ReadOptions, WriteOptions};

fn format_size(size: usize) -> String {
    humansize::format_size(size, humansize::BINARY.decimal_zeroes(2))
}

/// Classic 16-bytes-per-line hex dump, addresses starting at `base`
pub fn hex_dump(base: u16, data: &[u8]) -> String {
    data.chunks(16)
        .enumerate()
        .map(|(i, line)| {
            let address = base.wrapping_add((i * 16) as u16);
            let bytes = line.iter().map(|b| format!("{:02x}", b)).join(" ");
            let ascii: String = line
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect();
            format!("{:04x}: {:<47}  {}", address, bytes, ascii)
        })
        .join("\n")
}

pub fn read<L: SerialLink>(session: &mut RadioSession<L>, options: ReadOptions) -> Result<()> {
    info!(
        "Reading {} from {:#06x}",
        format_size(options.count),
        options.address
    );

    let data = session
        .read_memory(options.key, options.address, options.count)
        .context("Failed to read the radio memory")?;

    std::fs::write(&options.output, &data)
        .with_context(|| format!("Writing {}", options.output.display()))?;

    info!(
        "Saved {} to {}",
        format_size(data.len()),
        options.output.display()
    );

    Ok(())
}

pub fn write<L: SerialLink>(session: &mut RadioSession<L>, options: WriteOptions) -> Result<()> {
    let data = std::fs::read(&options.input)
        .with_context(|| format!("Reading {}", options.input.display()))?;

    info!(
        "Writing {} from {} to {:#06x}",
        format_size(data.len()),
        options.input.display(),
        options.address
    );

    session
        .write_memory(options.key, options.address, &data)
        .context("Failed to write the radio memory")?;

    info!("Done");

    Ok(())
}

pub fn read_block<L: SerialLink>(session: &mut RadioSession<L>, address: u16) -> Result<()> {
    let block = session
        .read_block(address)
        .with_context(|| format!("Failed to read block {:#06x}", address))?;

    info!("Block {:#06x}:\n{}", address, hex_dump(address, &block));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_layout() {
        let data: Vec<u8> = (0x41..0x41 + 20).collect();

        let dump = hex_dump(0xF240, &data);
        let lines: Vec<&str> = dump.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "f240: 41 42 43 44 45 46 47 48 49 4a 4b 4c 4d 4e 4f 50  ABCDEFGHIJKLMNOP"
        );
        assert!(lines[1].starts_with("f250: 51 52 53 54 "));
        assert!(lines[1].ends_with("  QRST"));
    }

    #[test]
    fn dump_masks_unprintable() {
        assert!(hex_dump(0, &[0x00, 0xFF, b'a']).ends_with("..a"));
    }
}
