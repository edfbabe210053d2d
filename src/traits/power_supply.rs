//! DC power supply capability.

use crate::error::AppResult;
use crate::traits::instrument::{Instrument, SubUnit, SubUnits};

/// Power supply with numbered outputs.
pub trait PowerSupply: Instrument {
    type Output: SupplyOutput;

    fn outputs(&self) -> &SubUnits<Self::Output>;

    fn output(&self, number: u8) -> AppResult<&Self::Output> {
        self.outputs().get(number)
    }
}

/// One supply output.
pub trait SupplyOutput: SubUnit {
    fn is_enabled(&self) -> AppResult<bool>;
    fn set_enabled(&self, enabled: bool) -> AppResult<()>;

    /// Voltage setpoint in volts.
    fn voltage(&self) -> AppResult<f64>;
    fn set_voltage(&self, volts: f64) -> AppResult<()>;

    /// Current setpoint in amperes.
    fn current(&self) -> AppResult<f64>;
    fn set_current(&self, amps: f64) -> AppResult<()>;
}
