//! Base capability shared by every SCPI driver.
//!
//! An [`Instrument`] owns exactly one [`SharedSession`]. The IEEE 488.2 common commands are
//! provided as default methods on top of that session; a driver only supplies how to enter and
//! leave remote mode.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use tracing::{info, warn};

use crate::error::{AppResult, InstrumentError};
use crate::scpi::{EventStatusFlags, ServiceRequestFlags, SharedSession};

/// Capability common to every instrument.
pub trait Instrument {
    /// The session this instrument and all of its sub-units talk through.
    fn session(&self) -> &SharedSession;

    /// Put the front panel in remote mode.
    fn remote(&mut self) -> AppResult<()>;

    /// Give control back to the front panel.
    ///
    /// Drivers without a local command implement this as a no-op.
    fn return_to_local(&mut self) -> AppResult<()>;

    /// Identification string (`*IDN?`).
    fn identity(&self) -> AppResult<String> {
        self.session().identity()
    }

    /// Status byte (`*STB?`).
    fn status(&self) -> AppResult<u8> {
        self.session().status()
    }

    /// Installed options (`*OPT?`).
    fn options(&self) -> AppResult<String> {
        self.session().options()
    }

    /// Whether all pending operations have finished (`*OPC?`).
    fn complete(&self) -> AppResult<bool> {
        self.session().complete()
    }

    /// Standard Event Status Enable register.
    fn event_status_enable(&self) -> AppResult<u8> {
        self.session().event_status_enable()
    }

    /// Write the Standard Event Status Enable register.
    fn set_event_status_enable(&mut self, value: u8) -> AppResult<()> {
        self.session().set_event_status_enable(value)
    }

    /// Pack individual flags into the Standard Event Status Enable register.
    fn event_status_enable_select(&mut self, flags: EventStatusFlags) -> AppResult<()> {
        self.session().event_status_enable_select(flags)
    }

    /// Service Request Enable register.
    fn service_request_enable(&self) -> AppResult<u8> {
        self.session().service_request_enable()
    }

    /// Write the Service Request Enable register.
    fn set_service_request_enable(&mut self, value: u8) -> AppResult<()> {
        self.session().set_service_request_enable(value)
    }

    /// Pack individual flags into the Service Request Enable register.
    fn service_request_enable_select(&mut self, flags: ServiceRequestFlags) -> AppResult<()> {
        self.session().service_request_enable_select(flags)
    }

    /// Software trigger (`*TRG`).
    fn trigger(&mut self) -> AppResult<()> {
        self.session().trigger()
    }

    /// Clear status (`*CLS`).
    fn clear(&mut self) -> AppResult<()> {
        self.session().clear()
    }

    /// Reset to factory state (`*RST`).
    fn reset(&mut self) -> AppResult<()> {
        self.session().reset()
    }

    /// Reset, clear status and enter remote mode.
    fn initialize(&mut self) -> AppResult<()> {
        self.reset()?;
        self.clear()?;
        self.remote()
    }

    /// Return to local and close the session.
    ///
    /// The session is closed even if returning to local fails; the first error is reported.
    /// A second call fails with [`InstrumentError::ClosedResource`].
    fn close(&mut self) -> AppResult<()> {
        let local = self.return_to_local();
        let closed = self.session().close();
        info!(endpoint = self.session().endpoint(), "Instrument closed");
        local.and(closed)
    }
}

impl<T: Instrument + ?Sized> Instrument for Box<T> {
    fn session(&self) -> &SharedSession {
        (**self).session()
    }

    fn remote(&mut self) -> AppResult<()> {
        (**self).remote()
    }

    fn return_to_local(&mut self) -> AppResult<()> {
        (**self).return_to_local()
    }

    fn close(&mut self) -> AppResult<()> {
        (**self).close()
    }
}

/// A numbered channel, output, port or measurement group.
pub trait SubUnit {
    /// One-based number as used on the wire.
    fn number(&self) -> u8;
}

/// Sub-units of one instrument, keyed by number.
#[derive(Debug, Clone)]
pub struct SubUnits<T> {
    kind: &'static str,
    units: BTreeMap<u8, T>,
}

impl<T: SubUnit> SubUnits<T> {
    /// Collect `units`; `kind` names them in lookup errors, e.g. "RTO6 channel".
    pub fn new(kind: &'static str, units: impl IntoIterator<Item = T>) -> Self {
        Self {
            kind,
            units: units.into_iter().map(|u| (u.number(), u)).collect(),
        }
    }

    /// Sub-unit `number`.
    ///
    /// # Errors
    /// [`InstrumentError::InvalidChoice`] if the instrument has no such sub-unit.
    pub fn get(&self, number: u8) -> AppResult<&T> {
        self.units
            .get(&number)
            .ok_or_else(|| InstrumentError::invalid_choice(self.kind, number.to_string()))
    }

    /// Valid numbers, ascending.
    pub fn numbers(&self) -> Vec<u8> {
        self.units.keys().copied().collect()
    }

    /// Units in index order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.units.values()
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True when the instrument has no units of this kind.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Closes an instrument when dropped.
///
/// Use [`finish`](Self::finish) to close explicitly and see the error; a failure during drop is
/// only logged.
pub struct InstrumentGuard<T: Instrument> {
    instrument: T,
    closed: bool,
}

impl<T: Instrument> InstrumentGuard<T> {
    /// Take ownership of an open instrument.
    pub fn new(instrument: T) -> Self {
        Self {
            instrument,
            closed: false,
        }
    }

    /// Close now and report the outcome.
    pub fn finish(mut self) -> AppResult<()> {
        self.closed = true;
        self.instrument.close()
    }
}

impl<T: Instrument> Deref for InstrumentGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instrument
    }
}

impl<T: Instrument> DerefMut for InstrumentGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.instrument
    }
}

impl<T: Instrument> Drop for InstrumentGuard<T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.instrument.close() {
            warn!("Failed to close instrument on drop: {}", e);
        }
    }
}
