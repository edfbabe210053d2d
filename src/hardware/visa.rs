//! VISA transport for GPIB/USB/LAN instruments.
//!
//! Wraps the `visa-rs` library. The instrument handle implements `std::io::Read` and
//! `std::io::Write`; terminators and completion handling stay in the session layers.
//!
//! Supports resource strings like:
//! - "GPIB0::1::INSTR" (GPIB interface)
//! - "USB0::0x1234::0x5678::SERIAL::INSTR" (USB)
//! - "TCPIP0::192.168.1.100::INSTR" (Ethernet/LXI)

use std::time::Duration;

use crate::error::{AppResult, InstrumentError};
use crate::hardware::transport::Transport;

#[cfg(feature = "instrument_visa")]
use visa_rs::{attribute::AttrTmoValue, prelude::*};

/// An open VISA instrument.
#[cfg(feature = "instrument_visa")]
pub struct VisaTransport {
    resource_name: String,
    // Kept alive for as long as the instrument handle is in use
    _rm: DefaultRM,
    instr: Instrument,
}

#[cfg(feature = "instrument_visa")]
impl VisaTransport {
    /// Open a VISA resource with its I/O timeout set to `timeout`.
    ///
    /// The session deadline then bounds each blocking library read as well as the session's
    /// own polling loop.
    ///
    /// # Errors
    /// Returns [`Connection`](InstrumentError::Connection) if the resource manager cannot be
    /// created, the resource cannot be found or opened, or the timeout is rejected.
    pub fn open(resource_name: &str, timeout: Duration) -> AppResult<Self> {
        let connection = |reason: String| InstrumentError::Connection {
            endpoint: resource_name.to_string(),
            reason,
        };

        let rm = DefaultRM::new()
            .map_err(|e| connection(format!("VISA resource manager unavailable: {e}")))?;
        let expr = std::ffi::CString::new(resource_name)
            .map_err(|e| connection(e.to_string()))?
            .into();
        let rsc = rm
            .find_res(&expr)
            .map_err(|e| connection(format!("resource not found: {e}")))?;
        let instr = rm
            .open(&rsc, AccessMode::NO_LOCK, TIMEOUT_IMMEDIATE)
            .map_err(|e| connection(e.to_string()))?;

        let millis = io_timeout_millis(timeout);
        let attr = AttrTmoValue::new_checked(millis)
            .ok_or_else(|| connection(format!("invalid I/O timeout {millis} ms")))?;
        instr
            .set_attr(attr)
            .map_err(|e| connection(format!("cannot set I/O timeout: {e}")))?;

        tracing::debug!(resource = resource_name, millis, "Opened VISA resource");
        Ok(Self {
            resource_name: resource_name.to_string(),
            _rm: rm,
            instr,
        })
    }
}

#[cfg(feature = "instrument_visa")]
impl Transport for VisaTransport {
    fn write_all(&mut self, bytes: &[u8]) -> AppResult<()> {
        use std::io::Write;
        (&self.instr).write_all(bytes)?;
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> AppResult<usize> {
        use std::io::Read;
        match (&self.instr).read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) -> AppResult<()> {
        tracing::debug!(resource = %self.resource_name, "Closing VISA resource");
        Ok(())
    }
}

/// Placeholder when VISA support is compiled out.
#[cfg(not(feature = "instrument_visa"))]
pub struct VisaTransport;

#[cfg(not(feature = "instrument_visa"))]
impl VisaTransport {
    /// Always fails: VISA support was not compiled in.
    pub fn open(_resource_name: &str, _timeout: Duration) -> AppResult<Self> {
        Err(InstrumentError::FeatureNotEnabled {
            backend: "VISA",
            feature: "instrument_visa",
        })
    }
}

#[cfg(not(feature = "instrument_visa"))]
impl Transport for VisaTransport {
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

/// VISA timeout attribute value for `timeout`.
///
/// Zero means "return immediately" to VISA and `u32::MAX` means "never", so both ends are
/// kept inside the finite range.
#[cfg_attr(not(feature = "instrument_visa"), allow(dead_code))]
fn io_timeout_millis(timeout: Duration) -> u32 {
    let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
    millis.clamp(1, u32::MAX - 1)
}
