//! Rohde & Schwarz RTO6 oscilloscope.
//!
//! Four input channels, eight math channels and ten measurement groups, all sharing the
//! instrument session. Channel 1 is switched off during construction since `*RST` turns it on.

use std::time::Duration;

use crate::error::{AppResult, InstrumentError};
use crate::hardware::{ResourceManager, Session, SessionConfig};
use crate::scpi::reply::{finite, finite_all, parse_f64, parse_switch, switch, unquote};
use crate::scpi::{Dialect, SessionHandle, SharedSession};
use crate::traits::labels::{closed_set, from_token};
use crate::traits::{
    Coupling, InputChannel, Instrument, MathChannel, MeasurementGroup, MeasurementSource,
    Oscilloscope, ScopeSource, SubUnit, SubUnits,
};

const CHANNELS: u8 = 4;
const MATHS: u8 = 8;
const MEASUREMENT_GROUPS: u8 = 10;

closed_set! {
    /// What stays fixed when the horizontal scale changes.
    pub enum HorizontalScaleMode: "horizontal scale mode" {
        /// Keep the resolution, adapt the record length.
        Resolution => "RES",
        /// Keep the record length, adapt the resolution.
        RecordLength => "RECL",
    }
}

/// A zoom window added to a diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomWindow {
    pub x_start: f64,
    pub x_stop: f64,
    pub y_start: f64,
    pub y_stop: f64,
    pub diagram: String,
    pub name: String,
}

impl ZoomWindow {
    /// Window in `Diagram1` named `Zoom1`.
    pub fn new(x_start: f64, x_stop: f64, y_start: f64, y_stop: f64) -> Self {
        Self {
            x_start,
            x_stop,
            y_start,
            y_stop,
            diagram: "Diagram1".to_string(),
            name: "Zoom1".to_string(),
        }
    }
}

fn source_token(source: ScopeSource) -> &'static str {
    match source {
        ScopeSource::C1 => "CHAN1",
        ScopeSource::C2 => "CHAN2",
        ScopeSource::C3 => "CHAN3",
        ScopeSource::C4 => "CHAN4",
        ScopeSource::Ext => "EXT",
    }
}

/// Suffix of `TRIG1:LEV<n>` for a trigger source.
fn level_index(source: ScopeSource) -> u8 {
    match source {
        ScopeSource::C1 => 1,
        ScopeSource::C2 => 2,
        ScopeSource::C3 => 3,
        ScopeSource::C4 => 4,
        ScopeSource::Ext => 5,
    }
}

fn coupling_token(coupling: Coupling) -> &'static str {
    match coupling {
        Coupling::Dc => "DC",
        Coupling::DcLimit => "DCL",
        Coupling::Ac => "AC",
    }
}

fn measurement_source_token(source: MeasurementSource) -> &'static str {
    use MeasurementSource::*;
    match source {
        C1 => "C1W1",
        C2 => "C2W1",
        C3 => "C3W1",
        C4 => "C4W1",
        M1 => "M1",
        M2 => "M2",
        M3 => "M3",
        M4 => "M4",
        M5 => "M5",
        M6 => "M6",
        M7 => "M7",
        M8 => "M8",
    }
}

fn query_coupling(session: &SessionHandle, command: &str) -> AppResult<Coupling> {
    let reply = session.query(command)?;
    from_token(Coupling::ALL, coupling_token, command, &reply)
}

/// RTO6 driver.
#[derive(Debug)]
pub struct Rto6 {
    session: SharedSession,
    channels: SubUnits<Rto6Channel>,
    maths: SubUnits<Rto6Math>,
    measurements: SubUnits<Rto6Measurement>,
}

impl Rto6 {
    pub const DIALECT: Dialect = Dialect {
        name: "R&S RTO6",
        timeout: Duration::from_millis(10_000),
        ..Dialect::IEEE488
    };

    /// Bind an open session, reset, clear, enter remote and switch channel 1 off.
    pub fn new(session: Session) -> AppResult<Self> {
        let session = super::connect(session, Self::DIALECT)?;
        let channels = SubUnits::new(
            "RTO6 channel",
            (1..=CHANNELS).map(|n| Rto6Channel {
                number: n,
                session: session.handle(),
            }),
        );
        let maths = SubUnits::new(
            "RTO6 math channel",
            (1..=MATHS).map(|n| Rto6Math {
                number: n,
                session: session.handle(),
            }),
        );
        let measurements = SubUnits::new(
            "RTO6 measurement group",
            (1..=MEASUREMENT_GROUPS).map(|n| Rto6Measurement {
                number: n,
                session: session.handle(),
            }),
        );
        let mut scope = Self {
            session,
            channels,
            maths,
            measurements,
        };
        scope.initialize()?;
        scope.channel(1)?.set_enabled(false)?;
        Ok(scope)
    }

    pub fn open(
        manager: &ResourceManager,
        resource: &str,
        config: SessionConfig,
    ) -> AppResult<Self> {
        Self::new(manager.open(resource, config)?)
    }

    pub fn horizontal_scale_mode(&self) -> AppResult<HorizontalScaleMode> {
        let reply = self.session.query("ACQ:POIN:AUTO?")?;
        from_token(
            HorizontalScaleMode::ALL,
            HorizontalScaleMode::label,
            "ACQ:POIN:AUTO?",
            &reply,
        )
    }

    pub fn set_horizontal_scale_mode(&mut self, mode: HorizontalScaleMode) -> AppResult<()> {
        self.session.write(&format!("ACQ:POIN:AUTO {mode}"))
    }

    /// Add a vertical zoom window.
    pub fn zoom(&mut self, window: &ZoomWindow) -> AppResult<()> {
        finite_all(&[
            ("zoom x start", Some(window.x_start)),
            ("zoom x stop", Some(window.x_stop)),
            ("zoom y start", Some(window.y_start)),
            ("zoom y stop", Some(window.y_stop)),
        ])?;
        self.session.write(&format!(
            "LAY:ZOOM:ADD '{}', VERT, OFF, {}, {}, {}, {}, '{}'",
            window.diagram, window.x_start, window.x_stop, window.y_start, window.y_stop,
            window.name
        ))
    }
}

impl Instrument for Rto6 {
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

impl Oscilloscope for Rto6 {
    type Channel = Rto6Channel;
    type Math = Rto6Math;
    type Measurement = Rto6Measurement;

    fn channels(&self) -> &SubUnits<Rto6Channel> {
        &self.channels
    }

    fn maths(&self) -> &SubUnits<Rto6Math> {
        &self.maths
    }

    fn measurements(&self) -> &SubUnits<Rto6Measurement> {
        &self.measurements
    }

    fn horizontal_scale(&self) -> AppResult<f64> {
        self.session.query_f64("TIM:SCAL?")
    }

    fn set_horizontal_scale(&mut self, value: f64) -> AppResult<()> {
        let value = finite("horizontal scale", value)?;
        self.session.write(&format!("TIM:SCAL {value}"))
    }

    fn horizontal_range(&self) -> AppResult<f64> {
        self.session.query_f64("TIM:RANG?")
    }

    fn set_horizontal_range(&mut self, value: f64) -> AppResult<()> {
        let value = finite("horizontal range", value)?;
        self.session.write(&format!("TIM:RANG {value}"))
    }

    fn horizontal_position(&self) -> AppResult<f64> {
        self.session.query_f64("TIM:HOR:POS?")
    }

    fn set_horizontal_position(&mut self, value: f64) -> AppResult<()> {
        let value = finite("horizontal position", value)?;
        self.session.write(&format!("TIM:HOR:POS {value}"))
    }

    fn horizontal_reference(&self) -> AppResult<f64> {
        self.session.query_f64("TIM:REF?")
    }

    fn set_horizontal_reference(&mut self, value: f64) -> AppResult<()> {
        let value = finite("horizontal reference", value)?;
        self.session.write(&format!("TIM:REF {value}"))
    }

    fn sample_rate(&self) -> AppResult<f64> {
        self.session.query_f64("ACQ:SRAT?")
    }

    fn set_sample_rate(&mut self, value: f64) -> AppResult<()> {
        let value = finite("sample rate", value)?;
        self.session.write(&format!("ACQ:SRAT {value}"))
    }

    fn resolution(&self) -> AppResult<f64> {
        self.session.query_f64("ACQ:RES?")
    }

    fn set_resolution(&mut self, value: f64) -> AppResult<()> {
        let value = finite("resolution", value)?;
        self.session.write(&format!("ACQ:RES {value}"))
    }

    fn record_length(&self) -> AppResult<u64> {
        let reply = self.session.query("ACQ:POIN?")?;
        // Reported as a float, e.g. 1.000E+04
        let points = parse_f64("ACQ:POIN?", &reply)?;
        if points.is_finite() && points >= 0.0 {
            Ok(points.round() as u64)
        } else {
            Err(InstrumentError::parse("ACQ:POIN?", reply))
        }
    }

    fn set_record_length(&mut self, value: u64) -> AppResult<()> {
        self.session.write(&format!("ACQ:POIN {value}"))
    }

    fn trigger_source(&self) -> AppResult<ScopeSource> {
        let reply = self.session.query("TRIG1:SOUR?")?;
        from_token(ScopeSource::ALL, source_token, "TRIG1:SOUR?", &reply)
    }

    fn set_trigger_source(&mut self, source: ScopeSource) -> AppResult<()> {
        self.session
            .write(&format!("TRIG1:SOUR {}", source_token(source)))
    }

    fn trigger_level(&self) -> AppResult<f64> {
        let index = level_index(self.trigger_source()?);
        self.session.query_f64(&format!("TRIG1:LEV{index}?"))
    }

    fn set_trigger_level(&mut self, value: f64) -> AppResult<()> {
        let value = finite("trigger level", value)?;
        let index = level_index(self.trigger_source()?);
        self.session.write(&format!("TRIG1:LEV{index} {value}"))
    }

    fn trigger_coupling(&self) -> AppResult<Coupling> {
        query_coupling(&self.session, "TRIG1:ANED:COUP?")
    }

    fn set_trigger_coupling(&mut self, coupling: Coupling) -> AppResult<()> {
        self.session
            .write(&format!("TRIG1:ANED:COUP {}", coupling_token(coupling)))
    }
}

/// Analog input channel of an [`Rto6`].
#[derive(Debug, Clone)]
pub struct Rto6Channel {
    number: u8,
    session: SessionHandle,
}

impl SubUnit for Rto6Channel {
    fn number(&self) -> u8 {
        self.number
    }
}

impl InputChannel for Rto6Channel {
    fn is_enabled(&self) -> AppResult<bool> {
        let command = format!("CHAN{}:STAT?", self.number);
        let reply = self.session.query(&command)?;
        parse_switch(&command, &reply)
    }

    fn set_enabled(&self, enabled: bool) -> AppResult<()> {
        self.session
            .write(&format!("CHAN{}:STAT {}", self.number, switch(enabled)))
    }

    fn vertical_scale(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!("CHAN{}:SCAL?", self.number))
    }

    fn set_vertical_scale(&self, value: f64) -> AppResult<()> {
        let value = finite("vertical scale", value)?;
        self.session
            .write(&format!("CHAN{}:SCAL {value}", self.number))
    }

    fn vertical_range(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!("CHAN{}:RANG?", self.number))
    }

    fn set_vertical_range(&self, value: f64) -> AppResult<()> {
        let value = finite("vertical range", value)?;
        self.session
            .write(&format!("CHAN{}:RANG {value}", self.number))
    }

    fn vertical_position(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!("CHAN{}:POS?", self.number))
    }

    fn set_vertical_position(&self, value: f64) -> AppResult<()> {
        let value = finite("vertical position", value)?;
        self.session
            .write(&format!("CHAN{}:POS {value}", self.number))
    }

    fn coupling(&self) -> AppResult<Coupling> {
        query_coupling(&self.session, &format!("CHAN{}:COUP?", self.number))
    }

    fn set_coupling(&self, coupling: Coupling) -> AppResult<()> {
        self.session.write(&format!(
            "CHAN{}:COUP {}",
            self.number,
            coupling_token(coupling)
        ))
    }
}

/// Math channel of an [`Rto6`].
#[derive(Debug, Clone)]
pub struct Rto6Math {
    number: u8,
    session: SessionHandle,
}

impl SubUnit for Rto6Math {
    fn number(&self) -> u8 {
        self.number
    }
}

impl MathChannel for Rto6Math {
    fn is_enabled(&self) -> AppResult<bool> {
        let command = format!("CALC:MATH{}:STAT?", self.number);
        let reply = self.session.query(&command)?;
        parse_switch(&command, &reply)
    }

    fn set_enabled(&self, enabled: bool) -> AppResult<()> {
        self.session
            .write(&format!("CALC:MATH{}:STAT {}", self.number, switch(enabled)))
    }

    fn expression(&self) -> AppResult<String> {
        let reply = self
            .session
            .query(&format!("CALC:MATH{}?", self.number))?;
        Ok(unquote(&reply).to_string())
    }

    fn set_expression(&self, expression: &str) -> AppResult<()> {
        self.session
            .write(&format!("CALC:MATH{} '{expression}'", self.number))
    }

    fn vertical_scale(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!("CALC:MATH{}:VERT:SCAL?", self.number))
    }

    fn set_vertical_scale(&self, value: f64) -> AppResult<()> {
        let value = finite("vertical scale", value)?;
        self.session
            .write(&format!("CALC:MATH{}:VERT:SCAL {value}", self.number))
    }

    fn vertical_range(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!("CALC:MATH{}:VERT:RANG?", self.number))
    }

    fn set_vertical_range(&self, value: f64) -> AppResult<()> {
        let value = finite("vertical range", value)?;
        self.session
            .write(&format!("CALC:MATH{}:VERT:RANG {value}", self.number))
    }
}

/// Measurement group of an [`Rto6`].
#[derive(Debug, Clone)]
pub struct Rto6Measurement {
    number: u8,
    session: SessionHandle,
}

impl Rto6Measurement {
    /// Restart statistics accumulation for this group.
    pub fn reset_statistics(&self) -> AppResult<()> {
        self.session
            .write(&format!("MEAS{}:STAT:RES", self.number))
    }
}

impl SubUnit for Rto6Measurement {
    fn number(&self) -> u8 {
        self.number
    }
}

impl MeasurementGroup for Rto6Measurement {
    fn is_enabled(&self) -> AppResult<bool> {
        let command = format!("MEAS{}?", self.number);
        let reply = self.session.query(&command)?;
        parse_switch(&command, &reply)
    }

    fn set_enabled(&self, enabled: bool) -> AppResult<()> {
        self.session
            .write(&format!("MEAS{} {}", self.number, switch(enabled)))
    }

    fn source1(&self) -> AppResult<String> {
        self.session.query(&format!("MEAS{}:FSRC?", self.number))
    }

    fn set_source1(&self, source: MeasurementSource) -> AppResult<()> {
        self.session.write(&format!(
            "MEAS{}:FSRC {}",
            self.number,
            measurement_source_token(source)
        ))
    }

    fn source2(&self) -> AppResult<String> {
        self.session.query(&format!("MEAS{}:SSRC?", self.number))
    }

    fn set_source2(&self, source: MeasurementSource) -> AppResult<()> {
        self.session.write(&format!(
            "MEAS{}:SSRC {}",
            self.number,
            measurement_source_token(source)
        ))
    }

    fn category(&self) -> AppResult<String> {
        self.session.query(&format!("MEAS{}:CAT?", self.number))
    }

    fn set_category(&self, category: &str) -> AppResult<()> {
        self.session
            .write(&format!("MEAS{}:CAT {category}", self.number))
    }

    fn main(&self) -> AppResult<String> {
        self.session.query(&format!("MEAS{}:MAIN?", self.number))
    }

    fn set_main(&self, parameter: &str) -> AppResult<()> {
        self.session
            .write(&format!("MEAS{}:MAIN {parameter}", self.number))
    }

    fn statistics(&self) -> AppResult<bool> {
        let command = format!("MEAS{}:STAT?", self.number);
        let reply = self.session.query(&command)?;
        parse_switch(&command, &reply)
    }

    fn set_statistics(&self, enabled: bool) -> AppResult<()> {
        self.session
            .write(&format!("MEAS{}:STAT {}", self.number, switch(enabled)))
    }

    fn read_val(&self, parameter: Option<&str>, statistic: Option<&str>) -> AppResult<f64> {
        let statistic = statistic.unwrap_or("ACT");
        let command = match parameter {
            Some(parameter) => format!("MEAS{}:RES:{statistic}? {parameter}", self.number),
            None => format!("MEAS{}:RES:{statistic}?", self.number),
        };
        self.session.query_f64(&command)
    }

    fn add_parameter(&self, parameter: &str) -> AppResult<()> {
        self.session
            .write(&format!("MEAS{}:ADD {parameter}, ON", self.number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{MockHandle, MockTransport};
    use crate::traits::{ChannelSetup, MathSetup, MeasurementSetup, Timebase};

    fn scope(mock: MockTransport) -> (Rto6, MockHandle) {
        let log = mock.handle();
        let session = Session::from_transport(
            "TCPIP::192.168.0.10::INSTR",
            Box::new(mock),
            Rto6::DIALECT.session_config(),
        );
        let scope = Rto6::new(session).unwrap();
        (scope, log)
    }

    #[test]
    fn construction_disables_channel_one() {
        let (scope, log) = scope(MockTransport::new());
        assert_eq!(
            log.commands_without_handshake(),
            vec!["*IDN?", "*RST", "*CLS", "CHAN1:STAT OFF"]
        );
        assert_eq!(scope.channels().numbers(), vec![1, 2, 3, 4]);
        assert_eq!(scope.maths().len(), 8);
        assert_eq!(scope.measurements().len(), 10);
        assert!(scope.channel(5).is_err());
    }

    #[test]
    fn timebase_order() {
        let (mut scope, log) = scope(MockTransport::new());
        log.clear_log();
        scope
            .timebase(&Timebase {
                h_range: Some(0.001),
                resolution: Some(1e-9),
                record_length: Some(1000),
                h_ref: Some(50.0),
                h_pos: Some(0.0),
                ..Timebase::default()
            })
            .unwrap();
        assert_eq!(
            log.commands_without_handshake(),
            vec![
                "TIM:RANG 0.001",
                "ACQ:RES 0.000000001",
                "ACQ:POIN 1000",
                "TIM:REF 50",
                "TIM:HOR:POS 0",
            ]
        );
    }

    #[test]
    fn invalid_timebase_writes_nothing() {
        let (mut scope, log) = scope(MockTransport::new());
        log.clear_log();
        let err = scope
            .timebase(&Timebase {
                h_scale: Some(1e-6),
                sample_rate: Some(1e9),
                resolution: Some(1e-9),
                ..Timebase::default()
            })
            .unwrap_err();
        assert!(matches!(err, InstrumentError::Configuration(_)));
        assert!(log.commands().is_empty());
    }

    #[test]
    fn non_finite_settings_write_nothing() {
        let (mut scope, log) = scope(MockTransport::new());
        log.clear_log();

        let err = scope
            .timebase(&Timebase {
                h_pos: Some(f64::NAN),
                ..Timebase::default()
            })
            .unwrap_err();
        assert!(matches!(err, InstrumentError::Configuration(_)));
        assert!(scope
            .trigger_config(ScopeSource::C1, f64::INFINITY, Coupling::Dc)
            .is_err());
        assert!(scope.set_horizontal_scale(f64::NAN).is_err());
        assert!(scope
            .zoom(&ZoomWindow::new(0.0, f64::NAN, -1.0, 1.0))
            .is_err());
        assert!(log.commands().is_empty());
    }

    #[test]
    fn trigger_level_uses_active_source() {
        let (mut scope, log) = scope(MockTransport::new().with_reply("TRIG1:SOUR?", "CHAN3"));
        log.clear_log();
        scope
            .trigger_config(ScopeSource::C3, 0.25, Coupling::Ac)
            .unwrap();
        assert_eq!(
            log.commands_without_handshake(),
            vec![
                "TRIG1:SOUR CHAN3",
                "TRIG1:SOUR?",
                "TRIG1:LEV3 0.25",
                "TRIG1:ANED:COUP AC",
            ]
        );
    }

    #[test]
    fn channel_setup_and_readback() {
        let mock = MockTransport::new()
            .with_reply("CHAN2:STAT?", "ON")
            .with_reply("CHAN2:COUP?", "DCL");
        let (scope, log) = scope(mock);
        log.clear_log();
        let channel = scope.channel(2).unwrap();
        channel
            .setup(&ChannelSetup {
                v_scale: Some(0.05),
                v_pos: Some(-1.0),
                coupling: Some(Coupling::DcLimit),
                ..ChannelSetup::default()
            })
            .unwrap();
        assert!(channel.is_enabled().unwrap());
        assert_eq!(channel.coupling().unwrap(), Coupling::DcLimit);
        assert_eq!(
            log.commands_without_handshake(),
            vec![
                "CHAN2:STAT ON",
                "CHAN2:SCAL 0.05",
                "CHAN2:POS -1",
                "CHAN2:COUP DCL",
                "CHAN2:STAT?",
                "CHAN2:COUP?",
            ]
        );
    }

    #[test]
    fn math_setup() {
        let (scope, log) = scope(MockTransport::new().with_reply("CALC:MATH1?", "'C1W1-C2W1'"));
        log.clear_log();
        let math = scope.math(1).unwrap();
        math.setup(&MathSetup {
            v_range: Some(2.0),
            ..MathSetup::new("C1W1-C2W1")
        })
        .unwrap();
        assert_eq!(math.expression().unwrap(), "C1W1-C2W1");
        assert_eq!(
            log.commands_without_handshake(),
            vec![
                "CALC:MATH1:STAT ON",
                "CALC:MATH1 'C1W1-C2W1'",
                "CALC:MATH1:VERT:RANG 2",
                "CALC:MATH1?",
            ]
        );
    }

    #[test]
    fn measurement_group_commands_carry_the_group_number() {
        let mock = MockTransport::new().with_reply("MEAS4:RES:AVG? AMPL", "1.25E-1");
        let (scope, log) = scope(mock);
        log.clear_log();
        let group = scope.measurement(4).unwrap();
        group
            .setup(&MeasurementSetup {
                category: Some("AMPT".to_string()),
                source2: Some(MeasurementSource::M2),
                statistics: true,
                ..MeasurementSetup::new("AMPL", MeasurementSource::C1)
            })
            .unwrap();
        group.add_parameter("RMS").unwrap();
        assert_eq!(group.read_val(Some("AMPL"), Some("AVG")).unwrap(), 0.125);
        group.reset_statistics().unwrap();
        assert_eq!(
            log.commands_without_handshake(),
            vec![
                "MEAS4 ON",
                "MEAS4:CAT AMPT",
                "MEAS4:MAIN AMPL",
                "MEAS4:FSRC C1W1",
                "MEAS4:SSRC M2",
                "MEAS4:STAT ON",
                "MEAS4:ADD RMS, ON",
                "MEAS4:RES:AVG? AMPL",
                "MEAS4:STAT:RES",
            ]
        );
    }

    #[test]
    fn scale_mode_and_zoom() {
        let (mut scope, log) = scope(MockTransport::new().with_reply("ACQ:POIN:AUTO?", "RECL"));
        log.clear_log();
        scope
            .set_horizontal_scale_mode(HorizontalScaleMode::Resolution)
            .unwrap();
        assert_eq!(
            scope.horizontal_scale_mode().unwrap(),
            HorizontalScaleMode::RecordLength
        );
        scope.zoom(&ZoomWindow::new(-1e-6, 1e-6, -0.5, 0.5)).unwrap();
        assert_eq!(
            log.commands_without_handshake(),
            vec![
                "ACQ:POIN:AUTO RES",
                "ACQ:POIN:AUTO?",
                "LAY:ZOOM:ADD 'Diagram1', VERT, OFF, -0.000001, 0.000001, -0.5, 0.5, 'Zoom1'",
            ]
        );
    }

    #[test]
    fn record_length_accepts_float_reply() {
        let (scope, _log) = scope(MockTransport::new().with_reply("ACQ:POIN?", "1.000E+04"));
        assert_eq!(scope.record_length().unwrap(), 10_000);
    }
}
