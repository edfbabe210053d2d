//! Serial port transport backed by the `serialport` crate.

#[cfg(feature = "instrument_serial")]
use std::time::Duration;

use crate::error::AppResult;
#[cfg(not(feature = "instrument_serial"))]
use crate::error::InstrumentError;
use crate::hardware::transport::Transport;

/// Internal read timeout of the port. Kept short so the session's own deadline governs.
#[cfg(feature = "instrument_serial")]
const PORT_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Default baud rate for instruments that do not configure one.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// An open serial port.
#[cfg(feature = "instrument_serial")]
pub struct SerialTransport {
    path: String,
    port: Box<dyn serialport::SerialPort>,
}

#[cfg(feature = "instrument_serial")]
impl SerialTransport {
    /// Open `path` at `baud_rate`, 8N1.
    ///
    /// # Errors
    /// Returns [`Connection`](crate::InstrumentError::Connection) if the port cannot be opened.
    pub fn open(path: &str, baud_rate: u32) -> AppResult<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(PORT_POLL_TIMEOUT)
            .open()
            .map_err(|e| crate::InstrumentError::Connection {
                endpoint: path.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(path, baud_rate, "Opened serial port");
        Ok(Self {
            path: path.to_string(),
            port,
        })
    }
}

#[cfg(feature = "instrument_serial")]
impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> AppResult<()> {
        use std::io::Write;
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> AppResult<usize> {
        use std::io::Read;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            // Port timeout is shorter than the session timeout
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) -> AppResult<()> {
        tracing::debug!(path = %self.path, "Closing serial port");
        Ok(())
    }
}

/// Placeholder when serial support is compiled out.
#[cfg(not(feature = "instrument_serial"))]
pub struct SerialTransport;

#[cfg(not(feature = "instrument_serial"))]
impl SerialTransport {
    /// Always fails: serial support was not compiled in.
    pub fn open(_path: &str, _baud_rate: u32) -> AppResult<Self> {
        Err(InstrumentError::FeatureNotEnabled {
            backend: "Serial",
            feature: "instrument_serial",
        })
    }
}

#[cfg(not(feature = "instrument_serial"))]
impl Transport for SerialTransport {
    fn write_all(&mut self, _bytes: &[u8]) -> AppResult<()> {
        Ok(())
    }

    fn read_chunk(&mut self, _buf: &mut [u8]) -> AppResult<usize> {
        Ok(0)
    }

    fn close(&mut self) -> AppResult<()> {
        Ok(())
    }
}
