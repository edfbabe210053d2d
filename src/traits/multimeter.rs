//! Digital multimeter capability.
//!
//! Settings are taken as closed sets ([`Function`], [`Range`], [`Rate`], [`TriggerSource`]).
//! Each driver translates them into its own command tokens and rejects members its hardware
//! does not offer with [`InstrumentError::InvalidChoice`](crate::InstrumentError::InvalidChoice)
//! before anything is written. Getters return the setting as the instrument reports it.

use tracing::info;

use crate::error::AppResult;
use crate::traits::instrument::Instrument;
use crate::traits::labels::closed_set;

closed_set! {
    /// Measurement function.
    pub enum Function: "multimeter function" {
        CurrentAc => "CURR:AC",
        CurrentDc => "CURR:DC",
        Continuity => "CONT",
        Diode => "DIOD",
        Frequency => "FREQ",
        Resistance => "RES",
        VoltageAc => "VOLT:AC",
        VoltageDc => "VOLT:DC",
    }
}

closed_set! {
    /// Measurement range. Which members apply depends on the function and the driver.
    pub enum Range: "multimeter range" {
        Millivolts100 => "100mV",
        Millivolts300 => "300mV",
        Volts1 => "1V",
        Volts3 => "3V",
        Volts10 => "10V",
        Volts30 => "30V",
        Volts100 => "100V",
        Volts300 => "300V",
        Volts750 => "750V",
        Volts1000 => "1kV" | "1000V",
        Ohms100 => "100Ohm",
        Ohms300 => "300Ohm",
        Kiloohms1 => "1kOhm",
        Kiloohms3 => "3kOhm",
        Kiloohms10 => "10kOhm",
        Kiloohms30 => "30kOhm",
        Kiloohms100 => "100kOhm",
        Kiloohms300 => "300kOhm",
        Megaohms1 => "1MOhm",
        Megaohms3 => "3MOhm",
        Megaohms10 => "10MOhm",
        Megaohms30 => "30MOhm",
        Megaohms100 => "100MOhm",
        Megaohms300 => "300MOhm",
        Milliamps10 => "10mA",
        Milliamps30 => "30mA",
        Milliamps100 => "100mA",
        Amps1 => "1A",
        Amps3 => "3A",
        Amps10 => "10A",
        Hertz1000 => "1000Hz",
        Kilohertz10 => "10kHz",
        Kilohertz100 => "100kHz",
        Kilohertz1000 => "1000kHz",
        Megahertz1 => "1MHz",
    }
}

closed_set! {
    /// Integration rate, from slowest and most precise to fastest.
    pub enum Rate: "multimeter rate" {
        Min => "min",
        Slow => "slow",
        Medium => "medium",
        Fast => "fast",
        Max => "max",
    }
}

closed_set! {
    /// What starts a reading.
    pub enum TriggerSource: "multimeter trigger source" {
        /// Free running.
        Internal => "internal",
        /// Rear-panel trigger input.
        External => "external",
        /// `*TRG` over the bus.
        Bus => "bus",
    }
}

/// Everything [`Multimeter::setup`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultimeterSetup {
    /// Measurement function, applied first.
    pub function: Function,
    /// Integration rate.
    pub rate: Rate,
    /// Range for `function`.
    pub range: Range,
    /// What starts a reading.
    pub trigger_source: TriggerSource,
    /// Log every command before it is sent.
    pub echo: bool,
}

/// Digital multimeter.
pub trait Multimeter: Instrument {
    /// Active function as reported by the instrument.
    fn function(&self) -> AppResult<String>;

    fn set_function(&mut self, function: Function) -> AppResult<()>;

    /// Active range as reported by the instrument.
    fn range(&self) -> AppResult<String>;

    /// Select a range for the active function.
    fn set_range(&mut self, range: Range) -> AppResult<()>;

    /// Active rate as reported by the instrument.
    fn rate(&self) -> AppResult<String>;

    fn set_rate(&mut self, rate: Rate) -> AppResult<()>;

    /// Active trigger source as reported by the instrument.
    fn trigger_source(&self) -> AppResult<String>;

    fn set_trigger_source(&mut self, source: TriggerSource) -> AppResult<()>;

    /// Whether [`measure`](Self::measure) must fire a bus trigger before reading.
    ///
    /// Cached when the trigger source is set; true only for [`TriggerSource::Bus`].
    fn trigger_measurement(&self) -> bool;

    /// Fetch the most recent reading.
    fn read_val(&mut self) -> AppResult<f64>;

    /// Reject a combination the hardware does not support, without writing anything.
    fn check_setup(&self, setup: &MultimeterSetup) -> AppResult<()>;

    /// Take one reading, triggering first when the trigger source is the bus.
    fn measure(&mut self) -> AppResult<f64> {
        if self.trigger_measurement() {
            self.trigger()?;
        }
        self.read_val()
    }

    /// Apply a full configuration: echo, then function, rate, range and trigger source.
    ///
    /// The whole combination is checked first, so an unsupported member fails before any
    /// command is sent.
    fn setup(&mut self, setup: &MultimeterSetup) -> AppResult<()> {
        self.check_setup(setup)?;
        self.session().set_echo(setup.echo)?;
        self.set_function(setup.function)?;
        self.set_rate(setup.rate)?;
        self.set_range(setup.range)?;
        self.set_trigger_source(setup.trigger_source)?;
        info!(
            endpoint = self.session().endpoint(),
            function = %setup.function,
            rate = %setup.rate,
            range = %setup.range,
            trigger = %setup.trigger_source,
            "Multimeter configured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InstrumentError;

    #[test]
    fn thousand_volt_range_has_two_spellings() {
        assert_eq!("1kV".parse::<Range>().unwrap(), Range::Volts1000);
        assert_eq!("1000V".parse::<Range>().unwrap(), Range::Volts1000);
        assert_eq!(Range::Volts1000.label(), "1kV");
    }

    #[test]
    fn labels_are_case_sensitive() {
        // 1MOhm and 1mOhm would be different ranges
        assert!("1mohm".parse::<Range>().is_err());
        assert_eq!("slow".parse::<Rate>().unwrap(), Rate::Slow);
        assert!(matches!(
            "SLOW".parse::<Rate>(),
            Err(InstrumentError::InvalidChoice { kind: "multimeter rate", .. })
        ));
    }

    #[test]
    fn every_function_label_parses() {
        for label in ["CURR:AC", "CURR:DC", "CONT", "DIOD", "FREQ", "RES", "VOLT:AC", "VOLT:DC"] {
            assert_eq!(label.parse::<Function>().unwrap().label(), label);
        }
        assert_eq!(Range::ALL.len(), 35);
    }
}
