use anyhow::{bail, Context, Result};
use bf_prog::transport::SerialLink;
use bf_prog::{HandshakeInfo, RadioSession};
use prettytable::row;
use tracing::info;

/// Settings area holding the radio type digit
const SETTINGS_ADDRESS: u16 = 0xF000;
const SETTINGS_LEN: usize = 0x1000;
const RADIO_TYPE_OFFSET: usize = 0x255;

pub fn info(handshake: &HandshakeInfo) -> Result<()> {
    let mut table = prettytable::Table::new();
    table.set_format(*prettytable::format::consts::FORMAT_CLEAN);
    table.add_row(row!["Model:", handshake.model_text().trim_end()]);
    table.add_row(row!["Ident:", hex::encode(handshake.ident)]);
    table.add_row(row![
        "Program Ack:",
        format!("{:#04x}", handshake.program_ack)
    ]);
    table.add_row(row!["Send Reply:", format!("{:#04x}", handshake.send_reply)]);

    info!("Radio info:\n{}", table);

    Ok(())
}

/// Returns the patched settings area, or `None` if the digit is already right
fn patch_radio_type(mut settings: Vec<u8>, radio_type: u8) -> Result<Option<Vec<u8>>> {
    let wanted = b'0' + radio_type;
    let len = settings.len();
    let Some(current) = settings.get_mut(RADIO_TYPE_OFFSET) else {
        bail!("Settings area is too short ({} bytes)", len);
    };

    info!("Current radio type: {:?}", *current as char);

    if *current == wanted {
        return Ok(None);
    }
    *current = wanted;

    Ok(Some(settings))
}

pub fn set_radio_type<L: SerialLink>(
    session: &mut RadioSession<L>,
    radio_type: u8,
) -> Result<()> {
    let block_size = session.block_size() as usize;
    if SETTINGS_LEN % block_size != 0 {
        bail!(
            "Block size {:#04x} does not divide the settings area ({:#06x} bytes)",
            block_size,
            SETTINGS_LEN
        );
    }

    let settings = session
        .read_memory(None, SETTINGS_ADDRESS, SETTINGS_LEN)
        .context("Failed to read the settings area")?;

    let Some(settings) = patch_radio_type(settings, radio_type)? else {
        info!("Radio type is already {}, nothing to do", radio_type);
        return Ok(());
    };

    session
        .write_memory(None, SETTINGS_ADDRESS, &settings)
        .context("Failed to write the settings area")?;

    // read back the block holding the digit to make sure it stuck
    let block_offset = RADIO_TYPE_OFFSET / block_size * block_size;
    let block_address = SETTINGS_ADDRESS.wrapping_add(block_offset as u16);
    let block = session
        .read_block(block_address)
        .context("Failed to read back the radio type")?;

    let stored = block[RADIO_TYPE_OFFSET - block_offset];
    if stored != b'0' + radio_type {
        bail!(
            "Radio type did not stick: wrote {:?}, read back {:?}",
            (b'0' + radio_type) as char,
            stored as char
        );
    }

    info!("Radio type set to {}", radio_type);

    Ok(())
}
