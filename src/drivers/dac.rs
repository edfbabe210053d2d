//! Six-channel serial DAC driven with Modbus-style binary frames.
//!
//! Every message is `01 06` (device address, write single register) followed by a payload and
//! a little-endian Modbus CRC-16. Setting a channel voltage writes register `0x0009 + channel`
//! with the millivolt value big-endian:
//!
//! ```text
//! 01 06 00 0F 03 E8 B9 77   channel 6 -> 1000 mV
//! ```
//!
//! The device never answers.

use tracing::debug;

use crate::checksum::append_check;
use crate::error::{AppResult, InstrumentError};
use crate::hardware::{ResourceManager, Session, SessionConfig, DEFAULT_BAUD_RATE};

/// Frame header: device address 1, function 6.
const WRITE_HEADER: [u8; 2] = [0x01, 0x06];

/// Register of channel `n` is `CHANNEL_REGISTER_BASE + n`.
const CHANNEL_REGISTER_BASE: u8 = 0x09;

/// Valid output channels.
pub const CHANNELS: std::ops::RangeInclusive<u8> = 1..=6;

/// Frame that sets `channel` to `millivolts`.
///
/// # Errors
/// [`InstrumentError::InvalidChoice`] for a channel outside 1 to 6.
pub fn encode_set_voltage(channel: u8, millivolts: u16) -> AppResult<[u8; 8]> {
    if !CHANNELS.contains(&channel) {
        return Err(InstrumentError::invalid_choice(
            "DAC channel",
            channel.to_string(),
        ));
    }
    let register = channel.wrapping_add(CHANNEL_REGISTER_BASE);
    let [hi, lo] = millivolts.to_be_bytes();
    let mut frame = Vec::with_capacity(8);
    frame.extend_from_slice(&WRITE_HEADER);
    frame.extend_from_slice(&[0x00, register, hi, lo]);
    append_check(&mut frame);

    let mut out = [0u8; 8];
    out.copy_from_slice(&frame);
    Ok(out)
}

/// Binary serial DAC.
#[derive(Debug)]
pub struct SerialDac {
    session: Session,
}

impl SerialDac {
    /// Use an already open session.
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Open the DAC's serial port at `baud_rate`.
    pub fn open(manager: &ResourceManager, port: &str, baud_rate: u32) -> AppResult<Self> {
        let config = SessionConfig::default().with_baud_rate(baud_rate);
        Ok(Self::new(manager.open(port, config)?))
    }

    /// Open at the default 9600 baud.
    pub fn open_default(manager: &ResourceManager, port: &str) -> AppResult<Self> {
        Self::open(manager, port, DEFAULT_BAUD_RATE)
    }

    /// Send `01 06`, `payload` and the check value.
    pub fn write(&mut self, payload: &[u8]) -> AppResult<()> {
        let mut frame = Vec::with_capacity(WRITE_HEADER.len() + payload.len() + 2);
        frame.extend_from_slice(&WRITE_HEADER);
        frame.extend_from_slice(payload);
        append_check(&mut frame);
        debug!(endpoint = self.session.endpoint(), frame = ?frame, "DAC frame");
        self.session.write_raw(&frame)
    }

    /// Set `channel` (1 to 6) to `millivolts`.
    pub fn set_volt(&mut self, channel: u8, millivolts: u16) -> AppResult<()> {
        let frame = encode_set_voltage(channel, millivolts)?;
        debug!(
            endpoint = self.session.endpoint(),
            channel, millivolts, "DAC set voltage"
        );
        self.session.write_raw(&frame)
    }

    /// Release the serial port. A second close fails with
    /// [`InstrumentError::ClosedResource`].
    pub fn close(&mut self) -> AppResult<()> {
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::check_is_valid;
    use crate::hardware::MockTransport;

    fn dac() -> (SerialDac, crate::hardware::MockHandle) {
        let mock = MockTransport::new();
        let log = mock.handle();
        let session =
            Session::from_transport("/dev/ttyUSB0", Box::new(mock), SessionConfig::default());
        (SerialDac::new(session), log)
    }

    #[test]
    fn channel_select_byte() {
        for channel in CHANNELS {
            let frame = encode_set_voltage(channel, 0).unwrap();
            assert_eq!(frame[3], channel + 0x09);
            assert!(check_is_valid(&frame));
        }
    }

    #[test]
    fn known_frames() {
        assert_eq!(
            encode_set_voltage(1, 0).unwrap(),
            [0x01, 0x06, 0x00, 0x0A, 0x00, 0x00, 0xA9, 0xC8]
        );
        assert_eq!(
            encode_set_voltage(2, 5000).unwrap(),
            [0x01, 0x06, 0x00, 0x0B, 0x13, 0x88, 0xF5, 0x5E]
        );
        assert_eq!(
            encode_set_voltage(2, 1500).unwrap(),
            [0x01, 0x06, 0x00, 0x0B, 0x05, 0xDC, 0xFA, 0xC1]
        );
    }

    #[test]
    fn millivolts_are_big_endian() {
        for mv in [0u16, 1, 255, 256, 1000, 4095, 65535] {
            let frame = encode_set_voltage(3, mv).unwrap();
            assert_eq!(u16::from_be_bytes([frame[4], frame[5]]), mv);
        }
    }

    #[test]
    fn out_of_range_channel_writes_nothing() {
        let (mut dac, log) = dac();
        assert!(matches!(
            dac.set_volt(7, 100),
            Err(InstrumentError::InvalidChoice { kind: "DAC channel", .. })
        ));
        assert!(dac.set_volt(0, 100).is_err());
        assert!(log.raw_writes().is_empty());
    }

    #[test]
    fn set_volt_sends_one_frame() {
        let (mut dac, log) = dac();
        dac.set_volt(6, 1000).unwrap();
        dac.write(&[0x00, 0x0A, 0x00, 0x00]).unwrap();
        assert_eq!(
            log.raw_writes(),
            vec![
                vec![0x01, 0x06, 0x00, 0x0F, 0x03, 0xE8, 0xB9, 0x77],
                vec![0x01, 0x06, 0x00, 0x0A, 0x00, 0x00, 0xA9, 0xC8],
            ]
        );
        dac.close().unwrap();
        assert!(log.is_closed());
        assert!(matches!(dac.close(), Err(InstrumentError::ClosedResource(_))));
    }
}
