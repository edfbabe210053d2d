//! Fluke 45 dual display multimeter.
//!
//! The Fluke 45 answers every line it receives, command or query, with a `=>` prompt on a line
//! of its own. The dialect discards it after each write and each query reply.

use std::time::Duration;

use crate::error::{AppResult, InstrumentError};
use crate::hardware::{ResourceManager, Session, SessionConfig};
use crate::scpi::{Dialect, SharedSession};
use crate::traits::{
    Function, Instrument, Multimeter, MultimeterSetup, Range, Rate, TriggerSource,
};

/// Fluke 45 driver.
#[derive(Debug)]
pub struct Fluke45 {
    session: SharedSession,
    trigger_source: Option<TriggerSource>,
}

impl Fluke45 {
    pub const DIALECT: Dialect = Dialect {
        name: "Fluke 45",
        read_terminator: "\r\n",
        timeout: Duration::from_millis(2000),
        post_write_ack_read: true,
        post_query_ack_read: true,
        ..Dialect::IEEE488
    };

    /// Bind an open session, then reset, clear and enter remote.
    pub fn new(session: Session) -> AppResult<Self> {
        let mut dmm = Self {
            session: super::connect(session, Self::DIALECT)?,
            trigger_source: None,
        };
        dmm.initialize()?;
        Ok(dmm)
    }

    /// Open `resource` through `manager` and construct the driver.
    pub fn open(
        manager: &ResourceManager,
        resource: &str,
        config: SessionConfig,
    ) -> AppResult<Self> {
        Self::new(manager.open(resource, config)?)
    }

    fn function_token(function: Function) -> &'static str {
        match function {
            Function::CurrentAc => "AAC",
            Function::CurrentDc => "ADC",
            Function::Continuity => "CONT",
            Function::Diode => "DIODE",
            Function::Frequency => "FREQ",
            Function::Resistance => "OHMS",
            Function::VoltageAc => "VAC",
            Function::VoltageDc => "VDC",
        }
    }

    /// Range number; which physical range it selects depends on the active function.
    fn range_token(range: Range) -> AppResult<u8> {
        use Range::*;
        match range {
            Millivolts100 | Millivolts300 | Ohms100 | Ohms300 | Milliamps10 | Milliamps30
            | Hertz1000 => Ok(1),
            Volts1 | Volts3 | Kiloohms1 | Kiloohms3 | Milliamps100 | Kilohertz10 => Ok(2),
            Volts10 | Volts30 | Kiloohms10 | Kiloohms30 | Amps10 | Kilohertz100 => Ok(3),
            Volts100 | Volts300 | Volts750 | Kiloohms100 | Kiloohms300 | Kilohertz1000 => Ok(4),
            Volts1000 | Megaohms1 | Megaohms3 | Megahertz1 => Ok(5),
            Megaohms10 | Megaohms30 => Ok(6),
            Megaohms100 | Megaohms300 => Ok(7),
            Amps1 | Amps3 => Err(InstrumentError::invalid_choice(
                "Fluke 45 range",
                range.label(),
            )),
        }
    }

    fn rate_token(rate: Rate) -> &'static str {
        match rate {
            Rate::Min | Rate::Slow => "S",
            Rate::Medium => "M",
            Rate::Fast | Rate::Max => "F",
        }
    }

    fn trigger_token(source: TriggerSource) -> u8 {
        match source {
            TriggerSource::Internal => 1,
            TriggerSource::External => 5,
            TriggerSource::Bus => 3,
        }
    }

    /// Function on the secondary display.
    pub fn function2(&self) -> AppResult<String> {
        self.session.query("FUNC2?")
    }

    /// Select the secondary display function. Continuity is primary-only.
    pub fn set_function2(&mut self, function: Function) -> AppResult<()> {
        if function == Function::Continuity {
            return Err(InstrumentError::invalid_choice(
                "Fluke 45 secondary function",
                function.label(),
            ));
        }
        self.session
            .write(&format!("{}2", Self::function_token(function)))
    }

    /// Reading on the primary display.
    pub fn val1(&self) -> AppResult<f64> {
        self.session.query_f64("VAL1?")
    }
}

impl Instrument for Fluke45 {
    fn session(&self) -> &SharedSession {
        &self.session
    }

    // The Fluke 45 has no remote/local commands over RS-232.
    fn remote(&mut self) -> AppResult<()> {
        Ok(())
    }

    fn return_to_local(&mut self) -> AppResult<()> {
        Ok(())
    }
}

impl Multimeter for Fluke45 {
    fn function(&self) -> AppResult<String> {
        self.session.query("FUNC1?")
    }

    fn set_function(&mut self, function: Function) -> AppResult<()> {
        self.session.write(Self::function_token(function))
    }

    fn range(&self) -> AppResult<String> {
        self.session.query("RANGE1?")
    }

    fn set_range(&mut self, range: Range) -> AppResult<()> {
        let token = Self::range_token(range)?;
        self.session.write(&format!("RANGE {token}"))
    }

    fn rate(&self) -> AppResult<String> {
        self.session.query("RATE?")
    }

    fn set_rate(&mut self, rate: Rate) -> AppResult<()> {
        self.session
            .write(&format!("RATE {}", Self::rate_token(rate)))
    }

    fn trigger_source(&self) -> AppResult<String> {
        self.session.query("TRIGGER?")
    }

    fn set_trigger_source(&mut self, source: TriggerSource) -> AppResult<()> {
        self.session
            .write(&format!("TRIGGER {}", Self::trigger_token(source)))?;
        self.trigger_source = Some(source);
        Ok(())
    }

    fn trigger_measurement(&self) -> bool {
        self.trigger_source == Some(TriggerSource::Bus)
    }

    fn read_val(&mut self) -> AppResult<f64> {
        self.session.query_f64("VAL?")
    }

    fn check_setup(&self, setup: &MultimeterSetup) -> AppResult<()> {
        Self::range_token(setup.range).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{MockHandle, MockTransport};

    fn fluke(mock: MockTransport) -> (Fluke45, MockHandle) {
        let mock = mock.terminated_by("\r\n").with_ack_prompt("=>");
        let log = mock.handle();
        let session = Session::from_transport(
            "ASRL11::INSTR",
            Box::new(mock),
            Fluke45::DIALECT.session_config(),
        );
        let dmm = Fluke45::new(session).unwrap();
        (dmm, log)
    }

    #[test]
    fn construction_identifies_resets_and_clears() {
        let (_dmm, log) = fluke(MockTransport::new().with_reply("*IDN?", "FLUKE,45,0,1.6"));
        assert_eq!(log.commands_without_handshake(), vec!["*IDN?", "*RST", "*CLS"]);
    }

    #[test]
    fn range_numbers_follow_the_function_table() {
        assert_eq!(Fluke45::range_token(Range::Millivolts300).unwrap(), 1);
        assert_eq!(Fluke45::range_token(Range::Volts1000).unwrap(), 5);
        assert_eq!(Fluke45::range_token(Range::Megaohms300).unwrap(), 7);
        assert_eq!(Fluke45::range_token(Range::Megahertz1).unwrap(), 5);
        assert_eq!(Fluke45::range_token(Range::Amps10).unwrap(), 3);
    }

    #[test]
    fn unsupported_range_writes_nothing() {
        let (mut dmm, log) = fluke(MockTransport::new());
        log.clear_log();
        let err = dmm.set_range(Range::Amps3).unwrap_err();
        assert!(matches!(err, InstrumentError::InvalidChoice { kind: "Fluke 45 range", .. }));
        assert!(log.commands().is_empty());
    }

    #[test]
    fn secondary_display() {
        let (mut dmm, log) = fluke(MockTransport::new().with_reply("VAL1?", "+1.0E-3"));
        log.clear_log();
        dmm.set_function2(Function::Frequency).unwrap();
        assert!(dmm.set_function2(Function::Continuity).is_err());
        assert_eq!(dmm.val1().unwrap(), 1.0e-3);
        assert_eq!(log.commands_without_handshake(), vec!["FREQ2", "VAL1?"]);
    }

    #[test]
    fn only_bus_trigger_requires_software_trigger() {
        let (mut dmm, _log) = fluke(MockTransport::new());
        for (source, expected) in [
            (TriggerSource::Internal, false),
            (TriggerSource::External, false),
            (TriggerSource::Bus, true),
        ] {
            dmm.set_trigger_source(source).unwrap();
            assert_eq!(dmm.trigger_measurement(), expected);
        }
    }
}
