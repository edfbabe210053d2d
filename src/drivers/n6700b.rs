//! Agilent N6700B modular power supply mainframe with up to four output modules.
//!
//! Every output command carries a channel list suffix, e.g. `VOLT 5,(@2)` or `VOLT? (@2)`.

use crate::error::AppResult;
use crate::hardware::{ResourceManager, Session, SessionConfig};
use crate::scpi::reply::{finite, parse_switch, switch};
use crate::scpi::{Dialect, SessionHandle, SharedSession};
use crate::traits::labels::{closed_set, from_token};
use crate::traits::{Instrument, PowerSupply, SubUnit, SubUnits, SupplyOutput};

const OUTPUTS: u8 = 4;

closed_set! {
    /// Which quantity an output regulates when both limits could apply.
    pub enum PriorityMode: "priority mode" {
        Voltage => "VOLT",
        Current => "CURR",
    }
}

/// N6700B driver.
///
/// Construction only identifies the mainframe; it does not reset, so outputs that are already
/// configured keep their state.
#[derive(Debug)]
pub struct N6700b {
    session: SharedSession,
    outputs: SubUnits<N6700bOutput>,
}

impl N6700b {
    pub const DIALECT: Dialect = Dialect {
        name: "Agilent N6700B",
        ..Dialect::IEEE488
    };

    pub fn new(session: Session) -> AppResult<Self> {
        let session = super::connect(session, Self::DIALECT)?;
        let outputs = SubUnits::new(
            "N6700B output",
            (1..=OUTPUTS).map(|n| N6700bOutput {
                number: n,
                session: session.handle(),
            }),
        );
        Ok(Self { session, outputs })
    }

    pub fn open(
        manager: &ResourceManager,
        resource: &str,
        config: SessionConfig,
    ) -> AppResult<Self> {
        Self::new(manager.open(resource, config)?)
    }
}

impl Instrument for N6700b {
    fn session(&self) -> &SharedSession {
        &self.session
    }

    fn remote(&mut self) -> AppResult<()> {
        Ok(())
    }

    fn return_to_local(&mut self) -> AppResult<()> {
        Ok(())
    }
}

impl PowerSupply for N6700b {
    type Output = N6700bOutput;

    fn outputs(&self) -> &SubUnits<N6700bOutput> {
        &self.outputs
    }
}

/// One output module of an [`N6700b`].
#[derive(Debug, Clone)]
pub struct N6700bOutput {
    number: u8,
    session: SessionHandle,
}

impl N6700bOutput {
    fn query_f64(&self, header: &str) -> AppResult<f64> {
        self.session
            .query_f64(&format!("{header}? (@{})", self.number))
    }

    fn write_value(&self, header: &str, value: impl std::fmt::Display) -> AppResult<()> {
        self.session
            .write(&format!("{header} {value},(@{})", self.number))
    }

    pub fn positive_voltage_limit(&self) -> AppResult<f64> {
        self.query_f64("VOLT:LIM")
    }

    pub fn set_positive_voltage_limit(&self, volts: f64) -> AppResult<()> {
        let volts = finite("positive voltage limit", volts)?;
        self.write_value("VOLT:LIM", volts)
    }

    pub fn negative_voltage_limit(&self) -> AppResult<f64> {
        self.query_f64("VOLT:LIM:NEG")
    }

    pub fn set_negative_voltage_limit(&self, volts: f64) -> AppResult<()> {
        let volts = finite("negative voltage limit", volts)?;
        self.write_value("VOLT:LIM:NEG", volts)
    }

    pub fn positive_current_limit(&self) -> AppResult<f64> {
        self.query_f64("CURR:LIM")
    }

    pub fn set_positive_current_limit(&self, amps: f64) -> AppResult<()> {
        let amps = finite("positive current limit", amps)?;
        self.write_value("CURR:LIM", amps)
    }

    pub fn negative_current_limit(&self) -> AppResult<f64> {
        self.query_f64("CURR:LIM:NEG")
    }

    pub fn set_negative_current_limit(&self, amps: f64) -> AppResult<()> {
        let amps = finite("negative current limit", amps)?;
        self.write_value("CURR:LIM:NEG", amps)
    }

    pub fn priority_mode(&self) -> AppResult<PriorityMode> {
        let command = format!("FUNC? (@{})", self.number);
        let reply = self.session.query(&command)?;
        from_token(PriorityMode::ALL, PriorityMode::label, &command, &reply)
    }

    pub fn set_priority_mode(&self, mode: PriorityMode) -> AppResult<()> {
        self.write_value("FUNC", mode)
    }

    /// Measured output voltage.
    pub fn voltage_reading(&self) -> AppResult<f64> {
        self.query_f64("MEAS:VOLT")
    }

    /// Measured output current.
    pub fn current_reading(&self) -> AppResult<f64> {
        self.query_f64("MEAS:CURR")
    }
}

impl SubUnit for N6700bOutput {
    fn number(&self) -> u8 {
        self.number
    }
}

impl SupplyOutput for N6700bOutput {
    fn is_enabled(&self) -> AppResult<bool> {
        let command = format!("OUTP? (@{})", self.number);
        let reply = self.session.query(&command)?;
        parse_switch(&command, &reply)
    }

    fn set_enabled(&self, enabled: bool) -> AppResult<()> {
        self.write_value("OUTP", switch(enabled))
    }

    fn voltage(&self) -> AppResult<f64> {
        self.query_f64("VOLT")
    }

    fn set_voltage(&self, volts: f64) -> AppResult<()> {
        let volts = finite("voltage", volts)?;
        self.write_value("VOLT", volts)
    }

    fn current(&self) -> AppResult<f64> {
        self.query_f64("CURR")
    }

    fn set_current(&self, amps: f64) -> AppResult<()> {
        let amps = finite("current", amps)?;
        self.write_value("CURR", amps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{MockHandle, MockTransport};
    use crate::InstrumentError;

    fn supply(mock: MockTransport) -> (N6700b, MockHandle) {
        let log = mock.handle();
        let session = Session::from_transport(
            "TCPIP::10.0.0.5::INSTR",
            Box::new(mock),
            N6700b::DIALECT.session_config(),
        );
        (N6700b::new(session).unwrap(), log)
    }

    #[test]
    fn construction_does_not_reset() {
        let (psu, log) = supply(MockTransport::new());
        assert_eq!(log.commands_without_handshake(), vec!["*IDN?"]);
        assert_eq!(psu.outputs().numbers(), vec![1, 2, 3, 4]);
        assert!(psu.output(0).is_err());
        assert!(psu.output(5).is_err());
    }

    #[test]
    fn priority_mode_is_interpolated() {
        let (psu, log) = supply(MockTransport::new().with_reply("FUNC? (@3)", "CURR"));
        log.clear_log();
        let out = psu.output(3).unwrap();
        out.set_priority_mode(PriorityMode::Voltage).unwrap();
        assert_eq!(out.priority_mode().unwrap(), PriorityMode::Current);
        assert_eq!(
            log.commands_without_handshake(),
            vec!["FUNC VOLT,(@3)", "FUNC? (@3)"]
        );
    }

    #[test]
    fn output_commands_carry_channel_list() {
        let mock = MockTransport::new()
            .with_reply("OUTP? (@4)", "1")
            .with_reply("MEAS:VOLT? (@4)", "+4.99870E+00");
        let (psu, log) = supply(mock);
        log.clear_log();
        let out = psu.output(4).unwrap();
        out.set_voltage(5.0).unwrap();
        out.set_current(0.25).unwrap();
        out.set_positive_voltage_limit(6.0).unwrap();
        out.set_negative_current_limit(-0.1).unwrap();
        out.set_enabled(true).unwrap();
        assert!(out.is_enabled().unwrap());
        assert!((out.voltage_reading().unwrap() - 4.9987).abs() < 1e-9);
        assert_eq!(
            log.commands_without_handshake(),
            vec![
                "VOLT 5,(@4)",
                "CURR 0.25,(@4)",
                "VOLT:LIM 6,(@4)",
                "CURR:LIM:NEG -0.1,(@4)",
                "OUTP ON,(@4)",
                "OUTP? (@4)",
                "MEAS:VOLT? (@4)",
            ]
        );
    }

    #[test]
    fn non_finite_values_are_refused_before_writing() {
        let (psu, log) = supply(MockTransport::new());
        log.clear_log();
        let out = psu.output(2).unwrap();

        let err = out.set_voltage(f64::NAN).unwrap_err();
        assert!(matches!(err, InstrumentError::Configuration(_)));
        assert!(out.set_current(f64::INFINITY).is_err());
        assert!(out.set_negative_voltage_limit(f64::NEG_INFINITY).is_err());
        assert!(log.commands().is_empty());
    }
}
