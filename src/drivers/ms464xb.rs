//! Anritsu MS464xB VectorStar network analyzer.
//!
//! Commands are addressed to one analyzer channel (`:SENS<ch>`, `:CALC<ch>`, `:SOUR<ch>`),
//! chosen at construction. The analyzer enters remote mode on the first command it receives and
//! leaves it on `RTL`.

use std::time::Duration;

use tracing::info;

use crate::error::AppResult;
use crate::hardware::{ResourceManager, Session, SessionConfig};
use crate::scpi::reply::finite;
use crate::scpi::{CompletionPolicy, Dialect, SessionHandle, SharedSession};
use crate::traits::labels::from_token;
use crate::traits::{
    AnalyzerPort, FrequencyUnit, Instrument, NetworkAnalyzer, ParameterFormat, SubUnit, SubUnits,
    SweepType,
};

const PORTS: u8 = 2;

fn sweep_type_token(sweep_type: SweepType) -> &'static str {
    match sweep_type {
        SweepType::Linear => "LIN",
        SweepType::Logarithmic => "LOG",
        SweepType::FrequencySegment => "FSEGM",
        SweepType::IndexSegment => "ISEGM",
        SweepType::Power => "POW",
    }
}

fn frequency_unit_token(unit: FrequencyUnit) -> &'static str {
    match unit {
        FrequencyUnit::Hz => "HZ",
        FrequencyUnit::KHz => "KHZ",
        FrequencyUnit::MHz => "MHZ",
        FrequencyUnit::GHz => "GHZ",
    }
}

fn format_token(format: ParameterFormat) -> &'static str {
    match format {
        ParameterFormat::LinPhase => "LINPH",
        ParameterFormat::LogPhase => "LOGPH",
        ParameterFormat::RealImag => "REIM",
    }
}

/// MS464xB driver.
#[derive(Debug)]
pub struct Ms464xb {
    session: SharedSession,
    channel: u8,
    ports: SubUnits<Ms464xbPort>,
}

impl Ms464xb {
    pub const DIALECT: Dialect = Dialect {
        name: "Anritsu MS464xB",
        read_terminator: "\r\n",
        timeout: Duration::from_millis(10_000),
        completion: CompletionPolicy::ChainedOpc,
        ..Dialect::IEEE488
    };

    /// Bind an open session for analyzer `channel` and switch to the native command set.
    pub fn new(session: Session, channel: u8) -> AppResult<Self> {
        let session = super::connect(session, Self::DIALECT)?;
        let ports = SubUnits::new(
            "MS464xB port",
            (1..=PORTS).map(|n| Ms464xbPort {
                number: n,
                channel,
                session: session.handle(),
            }),
        );
        session.write("LANG NATIVE")?;
        Ok(Self {
            session,
            channel,
            ports,
        })
    }

    pub fn open(
        manager: &ResourceManager,
        resource: &str,
        channel: u8,
        config: SessionConfig,
    ) -> AppResult<Self> {
        Self::new(manager.open(resource, config)?, channel)
    }

    /// Analyzer channel all commands are addressed to.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Display format of the markers.
    pub fn marker_format(&self) -> AppResult<ParameterFormat> {
        let command = format!(":CALC{}:FORM?", self.channel);
        let reply = self.session.query(&command)?;
        from_token(ParameterFormat::ALL, format_token, &command, &reply)
    }

    pub fn set_marker_format(&mut self, format: ParameterFormat) -> AppResult<()> {
        self.session
            .write(&format!(":CALC{}:FORM {}", self.channel, format_token(format)))
    }

    /// Place a marker at `x`, run one sweep and read the marker.
    pub fn measure(
        &mut self,
        x: f64,
        marker: u8,
        trace: u8,
        format: ParameterFormat,
    ) -> AppResult<String> {
        finite("marker position", x)?;
        self.set_marker_format(format)?;
        self.set_marker(x, marker, trace)?;
        self.session.write("TRS;WFS")?;
        self.read_marker(marker, trace)
    }

    /// Run one sweep and save it on the instrument under `filename`.
    pub fn save_sweep(&mut self, filename: &str) -> AppResult<()> {
        self.session.write(&format!("TRS;WFS;SAVE \"{filename}\""))
    }
}

impl Instrument for Ms464xb {
    fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Any command switches the analyzer to remote.
    fn remote(&mut self) -> AppResult<()> {
        self.session.identity().map(|_| ())
    }

    fn return_to_local(&mut self) -> AppResult<()> {
        info!(endpoint = self.session.endpoint(), "RTL");
        self.session.write("RTL")
    }
}

impl NetworkAnalyzer for Ms464xb {
    type Port = Ms464xbPort;

    fn ports(&self) -> &SubUnits<Ms464xbPort> {
        &self.ports
    }

    fn sweep_type(&self) -> AppResult<SweepType> {
        let command = format!(":SENS{}:SWE:TYP?", self.channel);
        let reply = self.session.query(&command)?;
        from_token(SweepType::ALL, sweep_type_token, &command, &reply)
    }

    fn set_sweep_type(&mut self, sweep_type: SweepType) -> AppResult<()> {
        self.session.write(&format!(
            ":SENS{}:SWE:TYP {}",
            self.channel,
            sweep_type_token(sweep_type)
        ))
    }

    fn center_frequency(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!(":SENS{}:FREQ:CENT?", self.channel))
    }

    fn set_center_frequency(&mut self, hertz: f64) -> AppResult<()> {
        let hertz = finite("center frequency", hertz)?;
        self.session
            .write(&format!(":SENS{}:FREQ:CENT {hertz}", self.channel))
    }

    fn frequency_span(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!(":SENS{}:FREQ:SPAN?", self.channel))
    }

    fn set_frequency_span(&mut self, hertz: f64) -> AppResult<()> {
        let hertz = finite("frequency span", hertz)?;
        self.session
            .write(&format!(":SENS{}:FREQ:SPAN {hertz}", self.channel))
    }

    fn start_frequency(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!(":SENS{}:FREQ:STAR?", self.channel))
    }

    fn set_start_frequency(&mut self, hertz: f64) -> AppResult<()> {
        let hertz = finite("start frequency", hertz)?;
        self.session
            .write(&format!(":SENS{}:FREQ:STAR {hertz}", self.channel))
    }

    fn stop_frequency(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!(":SENS{}:FREQ:STOP?", self.channel))
    }

    fn set_stop_frequency(&mut self, hertz: f64) -> AppResult<()> {
        let hertz = finite("stop frequency", hertz)?;
        self.session
            .write(&format!(":SENS{}:FREQ:STOP {hertz}", self.channel))
    }

    fn cw_frequency(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!(":SENS{}:FREQ:CW?", self.channel))
    }

    fn set_cw_frequency(&mut self, hertz: f64) -> AppResult<()> {
        let hertz = finite("cw frequency", hertz)?;
        self.session
            .write(&format!(":SENS{}:FREQ:CW {hertz}", self.channel))
    }

    fn frequency_sweep_length(&self) -> AppResult<u32> {
        self.session
            .query_u32(&format!(":SENS{}:SWE:POIN?", self.channel))
    }

    fn set_frequency_sweep_length(&mut self, points: u32) -> AppResult<()> {
        self.session
            .write(&format!(":SENS{}:SWE:POIN {points}", self.channel))
    }

    fn snp_frequency_units(&self) -> AppResult<FrequencyUnit> {
        let reply = self.session.query(":FORM:SNP:FREQ?")?;
        from_token(FrequencyUnit::ALL, frequency_unit_token, ":FORM:SNP:FREQ?", &reply)
    }

    fn set_snp_frequency_units(&mut self, unit: FrequencyUnit) -> AppResult<()> {
        self.session
            .write(&format!(":FORM:SNP:FREQ {}", frequency_unit_token(unit)))
    }

    fn snp_parameter_format(&self) -> AppResult<ParameterFormat> {
        let reply = self.session.query(":FORM:SNP:PAR?")?;
        from_token(ParameterFormat::ALL, format_token, ":FORM:SNP:PAR?", &reply)
    }

    fn set_snp_parameter_format(&mut self, format: ParameterFormat) -> AppResult<()> {
        self.session
            .write(&format!(":FORM:SNP:PAR {}", format_token(format)))
    }

    fn get_marker(&self, number: u8, trace: u8) -> AppResult<f64> {
        self.session.query_f64(&format!(
            ":CALC{}:PAR{trace}:MARK{number}:X?",
            self.channel
        ))
    }

    fn set_marker(&mut self, x: f64, number: u8, trace: u8) -> AppResult<()> {
        let x = finite("marker position", x)?;
        let marker = format!(":CALC{}:PAR{trace}:MARK{number}", self.channel);
        self.session.write(&format!("{marker}:ACT"))?;
        self.session.write(&format!("{marker}:X {x}"))
    }

    fn read_marker(&self, number: u8, trace: u8) -> AppResult<String> {
        self.session.query(&format!(
            ":CALC{}:PAR{trace}:MARK{number}:Y?",
            self.channel
        ))
    }
}

/// Test port of an [`Ms464xb`].
#[derive(Debug, Clone)]
pub struct Ms464xbPort {
    number: u8,
    channel: u8,
    session: SessionHandle,
}

impl Ms464xbPort {
    fn header(&self) -> String {
        format!(":SOUR{}:POW:PORT{}", self.channel, self.number)
    }
}

impl SubUnit for Ms464xbPort {
    fn number(&self) -> u8 {
        self.number
    }
}

impl AnalyzerPort for Ms464xbPort {
    fn power(&self) -> AppResult<f64> {
        self.session.query_f64(&format!("{}?", self.header()))
    }

    fn set_power(&self, dbm: f64) -> AppResult<()> {
        let dbm = finite("power", dbm)?;
        self.session.write(&format!("{} {dbm}", self.header()))
    }

    fn power_sweep_start(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!("{}:LIN:POW:STAR?", self.header()))
    }

    fn set_power_sweep_start(&self, dbm: f64) -> AppResult<()> {
        let dbm = finite("power sweep start", dbm)?;
        self.session
            .write(&format!("{}:LIN:POW:STAR {dbm}", self.header()))
    }

    fn power_sweep_stop(&self) -> AppResult<f64> {
        self.session
            .query_f64(&format!("{}:LIN:POW:STOP?", self.header()))
    }

    fn set_power_sweep_stop(&self, dbm: f64) -> AppResult<()> {
        let dbm = finite("power sweep stop", dbm)?;
        self.session
            .write(&format!("{}:LIN:POW:STOP {dbm}", self.header()))
    }

    fn power_sweep_length(&self) -> AppResult<u32> {
        self.session
            .query_u32(&format!("{}:LIN:POW:POIN?", self.header()))
    }

    fn set_power_sweep_length(&self, points: u32) -> AppResult<()> {
        self.session
            .write(&format!("{}:LIN:POW:POIN {points}", self.header()))
    }

    fn set_sweep_type(&self, sweep_type: SweepType) -> AppResult<()> {
        self.session.write(&format!(
            ":SENS{}:SWE:TYP {}",
            self.channel,
            sweep_type_token(sweep_type)
        ))
    }

    fn set_cw_frequency(&self, hertz: f64) -> AppResult<()> {
        let hertz = finite("cw frequency", hertz)?;
        self.session
            .write(&format!(":SENS{}:FREQ:CW {hertz}", self.channel))
    }
}
