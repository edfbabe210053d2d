//! HP / Agilent 34401A multimeter.
//!
//! Range and integration time are addressed relative to the active function
//! (`VOLT:DC:RANG 10`, `VOLT:DC:NPLC 1`), so the driver remembers the last function it set and
//! refuses range or rate changes until one has been selected.

use std::time::Duration;

use crate::error::{AppResult, InstrumentError};
use crate::hardware::{ResourceManager, Session, SessionConfig};
use crate::scpi::{Dialect, SharedSession};
use crate::traits::{
    Function, Instrument, Multimeter, MultimeterSetup, Range, Rate, TriggerSource,
};

/// HP 34401A driver.
#[derive(Debug)]
pub struct Hp34401a {
    session: SharedSession,
    function: Option<Function>,
    trigger_source: Option<TriggerSource>,
}

impl Hp34401a {
    pub const DIALECT: Dialect = Dialect {
        name: "HP 34401A",
        read_terminator: "\r\n",
        timeout: Duration::from_millis(2000),
        ..Dialect::IEEE488
    };

    /// Bind an open session, then reset, clear and enter remote.
    pub fn new(session: Session) -> AppResult<Self> {
        let mut dmm = Self {
            session: super::connect(session, Self::DIALECT)?,
            function: None,
            trigger_source: None,
        };
        dmm.initialize()?;
        Ok(dmm)
    }

    pub fn open(
        manager: &ResourceManager,
        resource: &str,
        config: SessionConfig,
    ) -> AppResult<Self> {
        Self::new(manager.open(resource, config)?)
    }

    /// Upper range value in base units.
    fn range_token(range: Range) -> AppResult<&'static str> {
        use Range::*;
        match range {
            Millivolts100 => Ok("0.1"),
            Volts1 => Ok("1"),
            Volts10 => Ok("10"),
            Volts100 => Ok("100"),
            Volts750 => Ok("750"),
            Volts1000 => Ok("1000"),
            Ohms100 => Ok("100"),
            Kiloohms1 => Ok("1000"),
            Kiloohms10 => Ok("10000"),
            Kiloohms100 => Ok("100000"),
            Megaohms1 => Ok("1000000"),
            Megaohms10 => Ok("10000000"),
            Megaohms100 => Ok("100000000"),
            Milliamps10 => Ok("0.01"),
            Milliamps100 => Ok("0.1"),
            Amps1 => Ok("1"),
            Amps3 => Ok("3"),
            Millivolts300 | Volts3 | Volts30 | Volts300 | Ohms300 | Kiloohms3 | Kiloohms30
            | Kiloohms300 | Megaohms3 | Megaohms30 | Megaohms300 | Milliamps30 | Amps10
            | Hertz1000 | Kilohertz10 | Kilohertz100 | Kilohertz1000 | Megahertz1 => Err(
                InstrumentError::invalid_choice("HP 34401A range", range.label()),
            ),
        }
    }

    /// Integration time in power line cycles.
    fn rate_token(rate: Rate) -> &'static str {
        match rate {
            Rate::Min => "0.02",
            Rate::Slow => "0.2",
            Rate::Medium => "1",
            Rate::Fast => "10",
            Rate::Max => "100",
        }
    }

    fn trigger_token(source: TriggerSource) -> &'static str {
        match source {
            TriggerSource::Internal => "IMM",
            TriggerSource::External => "EXT",
            TriggerSource::Bus => "BUS",
        }
    }

    fn active_function(&self) -> AppResult<Function> {
        self.function.ok_or_else(|| {
            InstrumentError::Configuration(
                "HP 34401A range and rate are per function: set the function first".to_string(),
            )
        })
    }
}

impl Instrument for Hp34401a {
    fn session(&self) -> &SharedSession {
        &self.session
    }

    fn remote(&mut self) -> AppResult<()> {
        self.session.write("SYST:REM")
    }

    fn return_to_local(&mut self) -> AppResult<()> {
        self.session.write("SYST:LOC")
    }
}

impl Multimeter for Hp34401a {
    fn function(&self) -> AppResult<String> {
        self.session.query("FUNC?")
    }

    fn set_function(&mut self, function: Function) -> AppResult<()> {
        self.session.write(&format!("FUNC \"{function}\""))?;
        self.function = Some(function);
        Ok(())
    }

    fn range(&self) -> AppResult<String> {
        let function = self.active_function()?;
        self.session.query(&format!("{function}:RANG?"))
    }

    fn set_range(&mut self, range: Range) -> AppResult<()> {
        let token = Self::range_token(range)?;
        let function = self.active_function()?;
        self.session.write(&format!("{function}:RANG {token}"))
    }

    fn rate(&self) -> AppResult<String> {
        let function = self.active_function()?;
        self.session.query(&format!("{function}:NPLC?"))
    }

    fn set_rate(&mut self, rate: Rate) -> AppResult<()> {
        let function = self.active_function()?;
        self.session
            .write(&format!("{function}:NPLC {}", Self::rate_token(rate)))
    }

    fn trigger_source(&self) -> AppResult<String> {
        self.session.query("TRIG:SOUR?")
    }

    fn set_trigger_source(&mut self, source: TriggerSource) -> AppResult<()> {
        self.session
            .write(&format!("TRIG:SOUR {}", Self::trigger_token(source)))?;
        self.trigger_source = Some(source);
        Ok(())
    }

    fn trigger_measurement(&self) -> bool {
        self.trigger_source == Some(TriggerSource::Bus)
    }

    fn read_val(&mut self) -> AppResult<f64> {
        self.session.query_f64("READ?")
    }

    fn check_setup(&self, setup: &MultimeterSetup) -> AppResult<()> {
        Self::range_token(setup.range).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{MockHandle, MockTransport};

    fn hp(mock: MockTransport) -> (Hp34401a, MockHandle) {
        let mock = mock.terminated_by("\r\n");
        let log = mock.handle();
        let session = Session::from_transport(
            "GPIB0::22::INSTR",
            Box::new(mock),
            Hp34401a::DIALECT.session_config(),
        );
        (Hp34401a::new(session).unwrap(), log)
    }

    #[test]
    fn construction_enters_remote() {
        let (_dmm, log) = hp(MockTransport::new());
        assert_eq!(
            log.commands_without_handshake(),
            vec!["*IDN?", "*RST", "*CLS", "SYST:REM"]
        );
    }

    #[test]
    fn range_before_function_is_a_configuration_error() {
        let (mut dmm, log) = hp(MockTransport::new());
        log.clear_log();
        assert!(matches!(
            dmm.set_range(Range::Volts10),
            Err(InstrumentError::Configuration(_))
        ));
        assert!(matches!(dmm.rate(), Err(InstrumentError::Configuration(_))));
        assert!(log.commands().is_empty());
    }

    #[test]
    fn range_and_rate_follow_the_function() {
        let (mut dmm, log) = hp(MockTransport::new());
        log.clear_log();
        dmm.set_function(Function::Resistance).unwrap();
        dmm.set_range(Range::Kiloohms10).unwrap();
        dmm.set_rate(Rate::Min).unwrap();
        assert_eq!(
            log.commands_without_handshake(),
            vec!["FUNC \"RES\"", "RES:RANG 10000", "RES:NPLC 0.02"]
        );
    }

    #[test]
    fn trigger_source_sends_tokens() {
        let (mut dmm, log) = hp(MockTransport::new());
        log.clear_log();
        dmm.set_trigger_source(TriggerSource::External).unwrap();
        dmm.set_trigger_source(TriggerSource::Bus).unwrap();
        assert!(dmm.trigger_measurement());
        assert_eq!(
            log.commands_without_handshake(),
            vec!["TRIG:SOUR EXT", "TRIG:SOUR BUS"]
        );
    }

    #[test]
    fn close_returns_to_local() {
        let (mut dmm, log) = hp(MockTransport::new());
        log.clear_log();
        dmm.close().unwrap();
        assert_eq!(log.commands_without_handshake(), vec!["SYST:LOC"]);
        assert!(log.is_closed());
    }
}
