//! Vector network analyzer capability with per-port power control.

use tracing::debug;

use crate::error::{AppResult, InstrumentError};
use crate::scpi::reply::finite_all;
use crate::traits::instrument::{Instrument, SubUnit, SubUnits};
use crate::traits::labels::closed_set;

closed_set! {
    /// Sweep type.
    pub enum SweepType: "sweep type" {
        Linear => "LIN" | "linear",
        Logarithmic => "LOG" | "log",
        /// Frequency-based segments.
        FrequencySegment => "FSEGM" | "segment",
        /// Index-based segments.
        IndexSegment => "ISEGM" | "index_segment",
        /// Power sweep at a fixed CW frequency.
        Power => "POW" | "power",
    }
}

closed_set! {
    /// Frequency unit written to SnP files.
    pub enum FrequencyUnit: "frequency unit" {
        Hz => "HZ" | "Hz",
        KHz => "KHZ" | "kHz",
        MHz => "MHZ" | "MHz",
        GHz => "GHZ" | "GHz",
    }
}

closed_set! {
    /// How complex parameters are written.
    pub enum ParameterFormat: "parameter format" {
        /// Linear magnitude and phase.
        LinPhase => "lin_phase",
        /// Log magnitude and phase.
        LogPhase => "log_phase",
        RealImag => "real_imag",
    }
}

/// Frequency sweep for [`NetworkAnalyzer::setup_freq_sweep`].
///
/// Exactly one of (`start`, `stop`) or (`center`, `span`) must be given, both members of it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrequencySweep {
    /// Number of points.
    pub length: u32,
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub center: Option<f64>,
    pub span: Option<f64>,
    /// Left unchanged when `None`.
    pub sweep_type: Option<SweepType>,
}

/// The frequency pair a validated sweep uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepBounds {
    StartStop { start: f64, stop: f64 },
    CenterSpan { center: f64, span: f64 },
}

impl FrequencySweep {
    pub fn start_stop(length: u32, start: f64, stop: f64) -> Self {
        Self {
            length,
            start: Some(start),
            stop: Some(stop),
            ..Self::default()
        }
    }

    pub fn center_span(length: u32, center: f64, span: f64) -> Self {
        Self {
            length,
            center: Some(center),
            span: Some(span),
            ..Self::default()
        }
    }

    pub fn with_sweep_type(mut self, sweep_type: SweepType) -> Self {
        self.sweep_type = Some(sweep_type);
        self
    }

    /// Check the combination and return the pair to apply.
    pub fn bounds(&self) -> AppResult<SweepBounds> {
        if self.length == 0 {
            return Err(InstrumentError::Configuration(
                "Sweep length must be at least 1".to_string(),
            ));
        }
        finite_all(&[
            ("start frequency", self.start),
            ("stop frequency", self.stop),
            ("center frequency", self.center),
            ("frequency span", self.span),
        ])?;
        let any_edge = self.start.is_some() || self.stop.is_some();
        let any_center = self.center.is_some() || self.span.is_some();
        match (self.start, self.stop, self.center, self.span) {
            (Some(start), Some(stop), None, None) => Ok(SweepBounds::StartStop { start, stop }),
            (None, None, Some(center), Some(span)) => Ok(SweepBounds::CenterSpan { center, span }),
            _ if any_edge && any_center => Err(InstrumentError::Configuration(
                "Incorrect sweep specification: start/stop and center/span are exclusive"
                    .to_string(),
            )),
            _ => Err(InstrumentError::Configuration(
                "Incorrect sweep specification: give both start and stop, or both center and span"
                    .to_string(),
            )),
        }
    }
}

/// Power sweep for [`AnalyzerPort::config_power_sweep`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerSweep {
    /// Number of points.
    pub length: u32,
    /// Fixed frequency in hertz.
    pub cw_frequency: f64,
    /// Start power in dBm.
    pub start: f64,
    /// Stop power in dBm.
    pub stop: f64,
}

impl PowerSweep {
    pub fn validate(&self) -> AppResult<()> {
        if self.length == 0 {
            return Err(InstrumentError::Configuration(
                "Power sweep length must be at least 1".to_string(),
            ));
        }
        finite_all(&[
            ("cw frequency", Some(self.cw_frequency)),
            ("power sweep start", Some(self.start)),
            ("power sweep stop", Some(self.stop)),
        ])
    }
}

/// Vector network analyzer.
pub trait NetworkAnalyzer: Instrument {
    type Port: AnalyzerPort;

    fn ports(&self) -> &SubUnits<Self::Port>;

    fn port(&self, number: u8) -> AppResult<&Self::Port> {
        self.ports().get(number)
    }

    fn sweep_type(&self) -> AppResult<SweepType>;
    fn set_sweep_type(&mut self, sweep_type: SweepType) -> AppResult<()>;

    fn center_frequency(&self) -> AppResult<f64>;
    fn set_center_frequency(&mut self, hertz: f64) -> AppResult<()>;

    fn frequency_span(&self) -> AppResult<f64>;
    fn set_frequency_span(&mut self, hertz: f64) -> AppResult<()>;

    fn start_frequency(&self) -> AppResult<f64>;
    fn set_start_frequency(&mut self, hertz: f64) -> AppResult<()>;

    fn stop_frequency(&self) -> AppResult<f64>;
    fn set_stop_frequency(&mut self, hertz: f64) -> AppResult<()>;

    fn cw_frequency(&self) -> AppResult<f64>;
    fn set_cw_frequency(&mut self, hertz: f64) -> AppResult<()>;

    /// Points per frequency sweep.
    fn frequency_sweep_length(&self) -> AppResult<u32>;
    fn set_frequency_sweep_length(&mut self, points: u32) -> AppResult<()>;

    fn snp_frequency_units(&self) -> AppResult<FrequencyUnit>;
    fn set_snp_frequency_units(&mut self, unit: FrequencyUnit) -> AppResult<()>;

    fn snp_parameter_format(&self) -> AppResult<ParameterFormat>;
    fn set_snp_parameter_format(&mut self, format: ParameterFormat) -> AppResult<()>;

    /// Stimulus position of a marker.
    fn get_marker(&self, number: u8, trace: u8) -> AppResult<f64>;

    /// Activate a marker and move it to `x`.
    fn set_marker(&mut self, x: f64, number: u8, trace: u8) -> AppResult<()>;

    /// Response value at a marker, formatted by the instrument.
    fn read_marker(&self, number: u8, trace: u8) -> AppResult<String>;

    /// Sweep type (if given), length, then the chosen frequency pair.
    fn setup_freq_sweep(&mut self, sweep: &FrequencySweep) -> AppResult<()> {
        let bounds = sweep.bounds()?;
        if let Some(sweep_type) = sweep.sweep_type {
            self.set_sweep_type(sweep_type)?;
        }
        self.set_frequency_sweep_length(sweep.length)?;
        match bounds {
            SweepBounds::StartStop { start, stop } => {
                self.set_start_frequency(start)?;
                self.set_stop_frequency(stop)?;
            }
            SweepBounds::CenterSpan { center, span } => {
                self.set_center_frequency(center)?;
                self.set_frequency_span(span)?;
            }
        }
        debug!(endpoint = self.session().endpoint(), ?bounds, "Frequency sweep configured");
        Ok(())
    }
}

/// A test port of the analyzer.
pub trait AnalyzerPort: SubUnit {
    /// Source power in dBm.
    fn power(&self) -> AppResult<f64>;
    fn set_power(&self, dbm: f64) -> AppResult<()>;

    fn power_sweep_start(&self) -> AppResult<f64>;
    fn set_power_sweep_start(&self, dbm: f64) -> AppResult<()>;

    fn power_sweep_stop(&self) -> AppResult<f64>;
    fn set_power_sweep_stop(&self, dbm: f64) -> AppResult<()>;

    fn power_sweep_length(&self) -> AppResult<u32>;
    fn set_power_sweep_length(&self, points: u32) -> AppResult<()>;

    /// Sweep type of the analyzer channel this port belongs to.
    fn set_sweep_type(&self, sweep_type: SweepType) -> AppResult<()>;

    /// CW frequency of the analyzer channel this port belongs to.
    fn set_cw_frequency(&self, hertz: f64) -> AppResult<()>;

    /// Power sweep type, CW frequency, then start, stop and length.
    fn config_power_sweep(&self, sweep: &PowerSweep) -> AppResult<()> {
        sweep.validate()?;
        self.set_sweep_type(SweepType::Power)?;
        self.set_cw_frequency(sweep.cw_frequency)?;
        self.set_power_sweep_start(sweep.start)?;
        self.set_power_sweep_stop(sweep.stop)?;
        self.set_power_sweep_length(sweep.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_needs_exactly_one_complete_pair() {
        assert_eq!(
            FrequencySweep::start_stop(201, 1e9, 2e9).bounds().unwrap(),
            SweepBounds::StartStop {
                start: 1e9,
                stop: 2e9
            }
        );
        assert!(FrequencySweep::center_span(201, 1.5e9, 1e9).bounds().is_ok());

        let mixed = FrequencySweep {
            center: Some(1.5e9),
            ..FrequencySweep::start_stop(201, 1e9, 2e9)
        };
        assert!(matches!(mixed.bounds(), Err(InstrumentError::Configuration(_))));

        let half = FrequencySweep {
            length: 201,
            start: Some(1e9),
            ..FrequencySweep::default()
        };
        assert!(half.bounds().is_err());

        let none = FrequencySweep {
            length: 201,
            ..FrequencySweep::default()
        };
        assert!(none.bounds().is_err());
    }

    #[test]
    fn zero_length_sweep_is_rejected() {
        assert!(FrequencySweep::start_stop(0, 1e9, 2e9).bounds().is_err());
        let power = PowerSweep {
            length: 0,
            cw_frequency: 1e9,
            start: -10.0,
            stop: 0.0,
        };
        assert!(power.validate().is_err());
    }

    #[test]
    fn sweep_type_accepts_native_and_word_labels() {
        assert_eq!("POW".parse::<SweepType>().unwrap(), SweepType::Power);
        assert_eq!("log".parse::<SweepType>().unwrap(), SweepType::Logarithmic);
        assert_eq!("GHz".parse::<FrequencyUnit>().unwrap(), FrequencyUnit::GHz);
        assert!("LOGHP".parse::<ParameterFormat>().is_err());
    }
}
