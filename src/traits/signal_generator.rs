//! Signal generator capability.

use crate::error::AppResult;
use crate::traits::instrument::{Instrument, SubUnit, SubUnits};

/// Signal generator with one or more RF outputs.
pub trait SignalGenerator: Instrument {
    type Output: SignalOutput;

    fn outputs(&self) -> &SubUnits<Self::Output>;

    /// Output `number`, starting at 1.
    fn output(&self, number: u8) -> AppResult<&Self::Output> {
        self.outputs().get(number)
    }
}

/// A generator output.
pub trait SignalOutput: SubUnit {
    fn is_enabled(&self) -> AppResult<bool>;
    fn set_enabled(&self, enabled: bool) -> AppResult<()>;

    /// Frequency in hertz.
    fn frequency(&self) -> AppResult<f64>;
    fn set_frequency(&self, hertz: f64) -> AppResult<()>;

    /// Power in dBm.
    fn power(&self) -> AppResult<f64>;
    fn set_power(&self, dbm: f64) -> AppResult<()>;
}
