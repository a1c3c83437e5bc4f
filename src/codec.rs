//! Conversion between register values and the bytes on the wire.
//!
//! Values are carried as `u32` so a four byte block fits. PMBus multi-byte data is little
//! endian, so a word register holding `0x00FF` (255A) appears on the bus as `FF 00`.

use core::fmt;

use crate::{error::FormatError, registers::Format};

/// Largest data phase of any format.
pub const MAX_PAYLOAD: usize = Format::MAX_REPLY;

/// Data phase of a write, without the command byte.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD>;

/// Encode `value` into the data bytes `format` expects.
pub fn encode(format: Format, value: u32) -> Result<Payload, FormatError> {
    let width = data_width(format);
    if width < 4 && value >> (width * 8) != 0 {
        return Err(FormatError::Range(value));
    }

    let mut payload = Payload::new();
    if let Format::Block(count) = format {
        payload
            .push(count)
            .map_err(|_| FormatError::Range(value))?;
    }
    payload
        .extend_from_slice(&value.to_le_bytes()[..width])
        .map_err(|_| FormatError::Range(value))?;
    Ok(payload)
}

/// Decode a register reply.
///
/// The reply must be exactly as long as `format` dictates, and a block's byte count must agree
/// with the register, otherwise this is a [`FormatError`].
pub fn decode(format: Format, bytes: &[u8]) -> Result<u32, FormatError> {
    if bytes.len() != format.reply_len() {
        return Err(FormatError::Length {
            expected: format.reply_len(),
            found: bytes.len(),
        });
    }

    let data = match format {
        Format::Block(count) => {
            if count as usize > 4 {
                return Err(FormatError::Length {
                    expected: 4,
                    found: count as usize,
                });
            }
            if bytes[0] != count {
                return Err(FormatError::BlockCount {
                    expected: count,
                    found: bytes[0],
                });
            }
            &bytes[1..]
        }
        _ => bytes,
    };

    Ok(data
        .iter()
        .rev()
        .fold(0u32, |value, &byte| (value << 8) | byte as u32))
}

/// Number of value bytes in the data phase.
fn data_width(format: Format) -> usize {
    match format {
        Format::SendByte => 0,
        Format::Byte => 1,
        Format::Word => 2,
        Format::Block(count) => (count as usize).min(4),
    }
}

/// Show bytes as contiguous upper case hex in wire order, `FF00`.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Wire representation of `value` as `format` would send it, for status output.
///
/// Block byte counts are left out.
#[derive(Debug, Clone, Copy)]
pub struct WireValue(pub Format, pub u32);

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let WireValue(format, value) = *self;
        let width = data_width(format);
        HexBytes(&value.to_le_bytes()[..width]).fmt(f)
    }
}
