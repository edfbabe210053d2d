//! Byte-stream seam between sessions and physical channels.
//!
//! A [`Transport`] is one open channel (a serial port, a VISA instrument handle, or a mock)
//! and knows nothing about terminators or command framing; [`Session`](super::Session) adds
//! those. A [`Connector`] opens transports by address.

use crate::error::AppResult;
use crate::hardware::session::SessionConfig;

/// An open, raw communication channel.
pub trait Transport: Send {
    /// Write every byte, blocking until the channel accepted them.
    fn write_all(&mut self, bytes: &[u8]) -> AppResult<()>;

    /// Read whatever bytes are available into `buf`.
    ///
    /// Returns `Ok(0)` when nothing arrived within the channel's own short poll interval.
    /// The session decides when that becomes a timeout.
    fn read_chunk(&mut self, buf: &mut [u8]) -> AppResult<usize>;

    /// Release the underlying handle.
    fn close(&mut self) -> AppResult<()>;
}

/// Opens transports by address.
pub trait Connector: Send + Sync {
    /// Open `address`, failing with [`Connection`](crate::InstrumentError::Connection) when
    /// the endpoint is absent or unreachable.
    ///
    /// Serial channels take the baud rate from `config`; VISA channels take the I/O timeout.
    fn open(&self, address: &str, config: &SessionConfig) -> AppResult<Box<dyn Transport>>;
}

/// Classification of an endpoint address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A serial device path, e.g. `/dev/ttyUSB0` or `COM3`.
    Serial(String),
    /// Anything else is handed to the VISA library unchanged.
    Visa(String),
}

impl Endpoint {
    /// Classify an address.
    ///
    /// `ASRL<n>::INSTR` maps to `COM<n>`, `ASRL<path>::INSTR` maps to `<path>`, and bare
    /// device paths (`/dev/...`, `COM...`) are taken as serial ports.
    pub fn parse(address: &str) -> Self {
        let address = address.trim();
        if let Some(rest) = address.strip_prefix("ASRL") {
            let port = rest.strip_suffix("::INSTR").unwrap_or(rest);
            if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
                return Self::Serial(format!("COM{port}"));
            }
            return Self::Serial(normalize_com(port));
        }
        if address.starts_with("/dev/") || address.to_ascii_uppercase().starts_with("COM") {
            return Self::Serial(normalize_com(address));
        }
        Self::Visa(address.to_string())
    }

    /// Address the channel is actually opened on.
    ///
    /// Two spellings of the same port (`ASRL7::INSTR`, `COM7`, `com7`) share one canonical
    /// address.
    pub fn canonical(&self) -> &str {
        match self {
            Self::Serial(path) | Self::Visa(path) => path,
        }
    }
}

/// Windows port names are case-insensitive.
fn normalize_com(port: &str) -> String {
    if port.to_ascii_uppercase().starts_with("COM") {
        port.to_ascii_uppercase()
    } else {
        port.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asrl_number_maps_to_com_port() {
        assert_eq!(
            Endpoint::parse("ASRL11::INSTR"),
            Endpoint::Serial("COM11".to_string())
        );
    }

    #[test]
    fn asrl_path_maps_to_device() {
        assert_eq!(
            Endpoint::parse("ASRL/dev/ttyUSB0::INSTR"),
            Endpoint::Serial("/dev/ttyUSB0".to_string())
        );
    }

    #[test]
    fn bare_paths_are_serial() {
        assert!(matches!(Endpoint::parse("/dev/ttyACM1"), Endpoint::Serial(_)));
        assert!(matches!(Endpoint::parse("COM4"), Endpoint::Serial(_)));
    }

    #[test]
    fn spellings_of_one_port_share_a_canonical_address() {
        let spellings = ["ASRL7::INSTR", "COM7", "com7", " ASRL7 "];
        for address in spellings {
            assert_eq!(Endpoint::parse(address).canonical(), "COM7", "{address}");
        }
        assert_eq!(
            Endpoint::parse("ASRL/dev/ttyUSB0::INSTR").canonical(),
            Endpoint::parse("/dev/ttyUSB0").canonical()
        );
    }

    #[test]
    fn network_and_gpib_are_visa() {
        assert_eq!(
            Endpoint::parse("TCPIP0::192.168.1.100::INSTR"),
            Endpoint::Visa("TCPIP0::192.168.1.100::INSTR".to_string())
        );
        assert!(matches!(Endpoint::parse("GPIB0::22::INSTR"), Endpoint::Visa(_)));
    }
}
