//! The memory obfuscation used by the radio for some regions.
//!
//! It's *almost* a repeating 4-byte XOR, except that bytes are left alone whenever XORing them
//! would create or destroy one of the radio's sentinel values (`0x00` for "empty", `0xFF` for
//! "erased"), or when the key byte is a space. This keeps the transform self-inverse while never
//! touching the sentinels, so it must not be "simplified" into a plain XOR.

use crate::error::{Error, Result};

/// The key table, 20 keys of 4 bytes each
pub const KEY_TABLE: &[u8; 80] =
    b"BHT CO 7A ES EIYM PQXN YRVB  HQPW RCMS N SATK DHZO RC SL6RB  JCGPN VJ PKEK LI LZ";

pub const KEY_SIZE: usize = 4;
pub const KEY_COUNT: usize = KEY_TABLE.len() / KEY_SIZE;

const SPACE: u8 = b' ';
const EMPTY: u8 = 0x00;
const ERASED: u8 = 0xFF;

/// Returns the 4-byte key window at `index`
pub fn key(index: usize) -> Result<&'static [u8; KEY_SIZE]> {
    index
        .checked_mul(KEY_SIZE)
        .and_then(|start| KEY_TABLE.get(start..))
        .and_then(|rest| rest.get(..KEY_SIZE))
        .and_then(|window| window.try_into().ok())
        .ok_or(Error::KeyIndexOutOfRange(index, KEY_COUNT))
}

#[inline]
fn crypt_byte(data: u8, key: u8) -> u8 {
    if key == SPACE || data == EMPTY || data == ERASED || key == data || key ^ data == ERASED {
        data
    } else {
        data ^ key
    }
}

/// Applies the transform in place. Used for both directions.
pub fn crypt_in_place(data: &mut [u8], key_index: usize) -> Result<()> {
    let key = key(key_index)?;

    for (byte, &k) in data.iter_mut().zip(key.iter().cycle()) {
        *byte = crypt_byte(*byte, k);
    }

    Ok(())
}

/// Obfuscates (or de-obfuscates, it's the same thing) `data` with the key at `key_index`
pub fn crypt(data: &[u8], key_index: usize) -> Result<Vec<u8>> {
    let mut result = data.to_vec();
    crypt_in_place(&mut result, key_index)?;
    Ok(result)
}
