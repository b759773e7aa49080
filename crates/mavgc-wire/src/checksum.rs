//! X.25 checksum used by MAVLink frames.
//!
//! MAVLink calls this "CRC-16/CCITT"; the exact parameters (reflected,
//! init 0xFFFF, no final xor) are catalogued as CRC-16/MCRF4XX.

use crc::{Crc, CRC_16_MCRF4XX};

const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// Compute the frame checksum over the header bytes after the start marker,
/// the payload, and the per-message extra byte.
pub fn frame_checksum(header: &[u8], payload: &[u8], crc_extra: u8) -> u16 {
    let mut digest = X25.digest();
    digest.update(header);
    digest.update(payload);
    digest.update(&[crc_extra]);
    digest.finalize()
}
