//! Modbus CRC-16 used to frame binary DAC messages.

/// Initial accumulator value.
const CRC16_INIT: u16 = 0xFFFF;

/// Reflected form of the 0x8005 polynomial.
const CRC16_POLY: u16 = 0xA001;

/// Calculates the 16-bit Modbus check value over a slice of bytes.
///
/// The accumulator starts at all-ones; each byte is XORed into the low byte and then shifted
/// out one bit at a time, folding in the reflected polynomial whenever a set bit leaves. There
/// is no output XOR. The device expects the result appended least-significant byte first, see
/// [`append_check`].
pub fn compute_check(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Appends the check value of `frame` to itself, little-endian.
pub fn append_check(frame: &mut Vec<u8>) {
    let crc = compute_check(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Validates a frame whose last two bytes are its little-endian check value.
///
/// Running the algorithm over a message followed by its own check value yields zero.
pub fn check_is_valid(frame: &[u8]) -> bool {
    frame.len() >= 2 && compute_check(frame) == 0
}
