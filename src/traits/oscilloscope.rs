//! Oscilloscope capability with input channel, math channel and measurement group sub-units.
//!
//! The composite operations ([`Oscilloscope::timebase`], [`InputChannel::setup`],
//! [`MathChannel::setup`]) take a parameter struct and validate it completely before the first
//! command is written. A mutually exclusive pair given together is a
//! [`InstrumentError::Configuration`] and leaves the instrument untouched.

use tracing::debug;

use crate::error::{AppResult, InstrumentError};
use crate::scpi::reply::finite_all;
use crate::traits::instrument::{Instrument, SubUnit, SubUnits};
use crate::traits::labels::closed_set;

closed_set! {
    /// Trigger source.
    pub enum ScopeSource: "oscilloscope source" {
        C1 => "C1",
        C2 => "C2",
        C3 => "C3",
        C4 => "C4",
        /// External trigger input.
        Ext => "EXT",
    }
}

closed_set! {
    /// Input or trigger coupling.
    pub enum Coupling: "coupling" {
        /// DC, 50 Ohm.
        Dc => "DC",
        /// DC, 1 MOhm.
        DcLimit => "DCL",
        Ac => "AC",
    }
}

closed_set! {
    /// Source of a measurement group: an input channel or a math channel.
    pub enum MeasurementSource: "measurement source" {
        C1 => "C1",
        C2 => "C2",
        C3 => "C3",
        C4 => "C4",
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

/// Reject a pair where both members are set.
pub(crate) fn exclusive<A, B>(first: &Option<A>, second: &Option<B>, what: &str) -> AppResult<()> {
    if first.is_some() && second.is_some() {
        return Err(InstrumentError::Configuration(format!(
            "Incorrect {what} specification: give one, not both"
        )));
    }
    Ok(())
}

/// Acquisition timebase. Unset fields are left as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timebase {
    /// Samples per second. Exclusive with `resolution`.
    pub sample_rate: Option<f64>,
    /// Seconds between samples. Exclusive with `sample_rate`.
    pub resolution: Option<f64>,
    pub record_length: Option<u64>,
    /// Seconds per division. Exclusive with `h_range`.
    pub h_scale: Option<f64>,
    /// Seconds across the screen. Exclusive with `h_scale`.
    pub h_range: Option<f64>,
    /// Rescaling point, percent of the screen.
    pub h_ref: Option<f64>,
    /// Trigger offset in seconds.
    pub h_pos: Option<f64>,
}

impl Timebase {
    pub fn validate(&self) -> AppResult<()> {
        exclusive(&self.h_scale, &self.h_range, "scale/range")?;
        exclusive(&self.sample_rate, &self.resolution, "rate/resolution")?;
        finite_all(&[
            ("sample rate", self.sample_rate),
            ("resolution", self.resolution),
            ("horizontal scale", self.h_scale),
            ("horizontal range", self.h_range),
            ("horizontal reference", self.h_ref),
            ("horizontal position", self.h_pos),
        ])
    }
}

/// Vertical setup for an input channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelSetup {
    /// Volts per division. Exclusive with `v_range`.
    pub v_scale: Option<f64>,
    /// Volts across the screen. Exclusive with `v_scale`.
    pub v_range: Option<f64>,
    /// Divisions.
    pub v_pos: Option<f64>,
    pub coupling: Option<Coupling>,
}

impl ChannelSetup {
    pub fn validate(&self) -> AppResult<()> {
        exclusive(&self.v_scale, &self.v_range, "scale/range")?;
        finite_all(&[
            ("vertical scale", self.v_scale),
            ("vertical range", self.v_range),
            ("vertical position", self.v_pos),
        ])
    }
}

/// Setup for a math channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MathSetup {
    pub expression: String,
    pub v_scale: Option<f64>,
    pub v_range: Option<f64>,
}

impl MathSetup {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.expression.trim().is_empty() {
            return Err(InstrumentError::Configuration(
                "Math expression must not be empty".to_string(),
            ));
        }
        exclusive(&self.v_scale, &self.v_range, "scale/range")?;
        finite_all(&[
            ("vertical scale", self.v_scale),
            ("vertical range", self.v_range),
        ])
    }
}

/// Setup for a measurement group.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSetup {
    /// Primary measurement parameter, e.g. `AMPL` or `FREQ`.
    pub main: String,
    pub source1: MeasurementSource,
    /// Second source for two-channel measurements such as delay or phase.
    pub source2: Option<MeasurementSource>,
    /// Measurement category, e.g. `AMPT`.
    pub category: Option<String>,
    pub statistics: bool,
}

impl MeasurementSetup {
    pub fn new(main: impl Into<String>, source1: MeasurementSource) -> Self {
        Self {
            main: main.into(),
            source1,
            source2: None,
            category: None,
            statistics: false,
        }
    }
}

/// Oscilloscope.
pub trait Oscilloscope: Instrument {
    type Channel: InputChannel;
    type Math: MathChannel;
    type Measurement: MeasurementGroup;

    fn channels(&self) -> &SubUnits<Self::Channel>;
    fn maths(&self) -> &SubUnits<Self::Math>;
    fn measurements(&self) -> &SubUnits<Self::Measurement>;

    /// Input channel `number`, starting at 1.
    fn channel(&self, number: u8) -> AppResult<&Self::Channel> {
        self.channels().get(number)
    }

    fn math(&self, number: u8) -> AppResult<&Self::Math> {
        self.maths().get(number)
    }

    fn measurement(&self, number: u8) -> AppResult<&Self::Measurement> {
        self.measurements().get(number)
    }

    /// Seconds per division.
    fn horizontal_scale(&self) -> AppResult<f64>;
    fn set_horizontal_scale(&mut self, value: f64) -> AppResult<()>;

    /// Seconds across the whole screen.
    fn horizontal_range(&self) -> AppResult<f64>;
    fn set_horizontal_range(&mut self, value: f64) -> AppResult<()>;

    /// Trigger offset in seconds.
    fn horizontal_position(&self) -> AppResult<f64>;
    fn set_horizontal_position(&mut self, value: f64) -> AppResult<()>;

    /// Rescaling point in percent of the screen.
    fn horizontal_reference(&self) -> AppResult<f64>;
    fn set_horizontal_reference(&mut self, value: f64) -> AppResult<()>;

    fn sample_rate(&self) -> AppResult<f64>;
    fn set_sample_rate(&mut self, value: f64) -> AppResult<()>;

    fn resolution(&self) -> AppResult<f64>;
    fn set_resolution(&mut self, value: f64) -> AppResult<()>;

    /// Samples per acquisition.
    fn record_length(&self) -> AppResult<u64>;
    fn set_record_length(&mut self, value: u64) -> AppResult<()>;

    fn trigger_source(&self) -> AppResult<ScopeSource>;
    fn set_trigger_source(&mut self, source: ScopeSource) -> AppResult<()>;

    /// Trigger level of the selected trigger source, in volts.
    fn trigger_level(&self) -> AppResult<f64>;
    fn set_trigger_level(&mut self, value: f64) -> AppResult<()>;

    fn trigger_coupling(&self) -> AppResult<Coupling>;
    fn set_trigger_coupling(&mut self, coupling: Coupling) -> AppResult<()>;

    /// Apply a timebase: scale or range, rate or resolution, record length, reference,
    /// position.
    fn timebase(&mut self, timebase: &Timebase) -> AppResult<()> {
        timebase.validate()?;
        if let Some(scale) = timebase.h_scale {
            self.set_horizontal_scale(scale)?;
        } else if let Some(range) = timebase.h_range {
            self.set_horizontal_range(range)?;
        }
        if let Some(rate) = timebase.sample_rate {
            self.set_sample_rate(rate)?;
        } else if let Some(resolution) = timebase.resolution {
            self.set_resolution(resolution)?;
        }
        if let Some(length) = timebase.record_length {
            self.set_record_length(length)?;
        }
        if let Some(reference) = timebase.h_ref {
            self.set_horizontal_reference(reference)?;
        }
        if let Some(position) = timebase.h_pos {
            self.set_horizontal_position(position)?;
        }
        debug!(endpoint = self.session().endpoint(), ?timebase, "Timebase applied");
        Ok(())
    }

    /// Source, then level, then coupling.
    fn trigger_config(
        &mut self,
        source: ScopeSource,
        level: f64,
        coupling: Coupling,
    ) -> AppResult<()> {
        finite_all(&[("trigger level", Some(level))])?;
        self.set_trigger_source(source)?;
        self.set_trigger_level(level)?;
        self.set_trigger_coupling(coupling)
    }
}

/// Analog input channel.
pub trait InputChannel: SubUnit {
    fn is_enabled(&self) -> AppResult<bool>;
    fn set_enabled(&self, enabled: bool) -> AppResult<()>;

    /// Volts per division.
    fn vertical_scale(&self) -> AppResult<f64>;
    fn set_vertical_scale(&self, value: f64) -> AppResult<()>;

    /// Volts across the screen.
    fn vertical_range(&self) -> AppResult<f64>;
    fn set_vertical_range(&self, value: f64) -> AppResult<()>;

    /// Divisions.
    fn vertical_position(&self) -> AppResult<f64>;
    fn set_vertical_position(&self, value: f64) -> AppResult<()>;

    fn coupling(&self) -> AppResult<Coupling>;
    fn set_coupling(&self, coupling: Coupling) -> AppResult<()>;

    /// Enable the channel, then apply scale or range, position and coupling.
    fn setup(&self, setup: &ChannelSetup) -> AppResult<()> {
        setup.validate()?;
        self.set_enabled(true)?;
        if let Some(scale) = setup.v_scale {
            self.set_vertical_scale(scale)?;
        } else if let Some(range) = setup.v_range {
            self.set_vertical_range(range)?;
        }
        if let Some(position) = setup.v_pos {
            self.set_vertical_position(position)?;
        }
        if let Some(coupling) = setup.coupling {
            self.set_coupling(coupling)?;
        }
        Ok(())
    }
}

/// Math channel computing an expression over other waveforms.
pub trait MathChannel: SubUnit {
    fn is_enabled(&self) -> AppResult<bool>;
    fn set_enabled(&self, enabled: bool) -> AppResult<()>;

    fn expression(&self) -> AppResult<String>;
    fn set_expression(&self, expression: &str) -> AppResult<()>;

    fn vertical_scale(&self) -> AppResult<f64>;
    fn set_vertical_scale(&self, value: f64) -> AppResult<()>;

    fn vertical_range(&self) -> AppResult<f64>;
    fn set_vertical_range(&self, value: f64) -> AppResult<()>;

    /// Enable, set the expression, then scale or range.
    fn setup(&self, setup: &MathSetup) -> AppResult<()> {
        setup.validate()?;
        self.set_enabled(true)?;
        self.set_expression(&setup.expression)?;
        if let Some(scale) = setup.v_scale {
            self.set_vertical_scale(scale)?;
        } else if let Some(range) = setup.v_range {
            self.set_vertical_range(range)?;
        }
        Ok(())
    }
}

/// Automatic measurement group.
pub trait MeasurementGroup: SubUnit {
    fn is_enabled(&self) -> AppResult<bool>;
    fn set_enabled(&self, enabled: bool) -> AppResult<()>;

    /// Primary source as reported by the instrument.
    fn source1(&self) -> AppResult<String>;
    fn set_source1(&self, source: MeasurementSource) -> AppResult<()>;

    fn source2(&self) -> AppResult<String>;
    fn set_source2(&self, source: MeasurementSource) -> AppResult<()>;

    fn category(&self) -> AppResult<String>;
    fn set_category(&self, category: &str) -> AppResult<()>;

    /// Primary measurement parameter.
    fn main(&self) -> AppResult<String>;
    fn set_main(&self, parameter: &str) -> AppResult<()>;

    fn statistics(&self) -> AppResult<bool>;
    fn set_statistics(&self, enabled: bool) -> AppResult<()>;

    /// Read a result.
    ///
    /// `parameter` defaults to the main parameter and `statistic` to the current value.
    fn read_val(&self, parameter: Option<&str>, statistic: Option<&str>) -> AppResult<f64>;

    /// Add a secondary parameter to the group.
    fn add_parameter(&self, parameter: &str) -> AppResult<()>;

    /// Enable, then category, main parameter, sources and statistics.
    fn setup(&self, setup: &MeasurementSetup) -> AppResult<()> {
        if setup.main.trim().is_empty() {
            return Err(InstrumentError::Configuration(
                "Measurement parameter must not be empty".to_string(),
            ));
        }
        self.set_enabled(true)?;
        if let Some(category) = &setup.category {
            self.set_category(category)?;
        }
        self.set_main(&setup.main)?;
        self.set_source1(setup.source1)?;
        if let Some(source2) = setup.source2 {
            self.set_source2(source2)?;
        }
        if setup.statistics {
            self.set_statistics(true)?;
        }
        Ok(())
    }
}
