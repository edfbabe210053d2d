//! Capability traits.
//!
//! Each instrument family is a trait with a fixed set of typed properties. Vendor drivers
//! implement them on top of a [`SharedSession`](crate::scpi::SharedSession); the composite
//! setup operations are default methods, so every driver gets the same ordering and
//! validation.
//!
//! | Capability | Sub-units |
//! |------------|-----------|
//! | [`Multimeter`] | none |
//! | [`Oscilloscope`] | [`InputChannel`], [`MathChannel`], [`MeasurementGroup`] |
//! | [`SignalGenerator`] | [`SignalOutput`] |
//! | [`PowerSupply`] | [`SupplyOutput`] |
//! | [`NetworkAnalyzer`] | [`AnalyzerPort`] |

pub(crate) mod labels;

pub mod instrument;
pub mod multimeter;
pub mod network_analyzer;
pub mod oscilloscope;
pub mod power_supply;
pub mod signal_generator;

pub use instrument::{Instrument, InstrumentGuard, SubUnit, SubUnits};
pub use multimeter::{Function, Multimeter, MultimeterSetup, Range, Rate, TriggerSource};
pub use network_analyzer::{
    AnalyzerPort, FrequencySweep, FrequencyUnit, NetworkAnalyzer, ParameterFormat, PowerSweep,
    SweepBounds, SweepType,
};
pub use oscilloscope::{
    ChannelSetup, Coupling, InputChannel, MathChannel, MathSetup, MeasurementGroup,
    MeasurementSetup, MeasurementSource, Oscilloscope, ScopeSource, Timebase,
};
pub use power_supply::{PowerSupply, SupplyOutput};
pub use signal_generator::{SignalGenerator, SignalOutput};
