//! Core library for laboratory instrument control.
//!
//! This library contains the transport sessions, the synchronized SCPI layer, the capability
//! traits and the vendor drivers. It is used by the `labctl` command-line tool and by test
//! scripts that drive benches directly.
//!
//! Layers, bottom up:
//!
//! - [`checksum`]: CRC-16 used by binary serial devices
//! - [`hardware`]: raw transports, framing [`Session`]s and the [`ResourceManager`]
//! - [`scpi`]: per-instrument [`Dialect`]s and the lock-protected [`SharedSession`]
//! - [`traits`]: capability interfaces ([`Multimeter`], [`Oscilloscope`], ...)
//! - [`drivers`]: one module per instrument model
//!
//! ```no_run
//! use lab_instruments::drivers::Hp34401a;
//! use lab_instruments::{
//!     Function, Multimeter, MultimeterSetup, Range, Rate, ResourceManager, TriggerSource,
//! };
//!
//! let manager = ResourceManager::system();
//! let mut dmm = Hp34401a::open(&manager, "GPIB0::22::INSTR", Hp34401a::DIALECT.session_config())?;
//! dmm.setup(&MultimeterSetup {
//!     function: Function::VoltageDc,
//!     rate: Rate::Medium,
//!     range: Range::Volts10,
//!     trigger_source: TriggerSource::Internal,
//!     echo: false,
//! })?;
//! println!("{} V", dmm.measure()?);
//! # Ok::<(), lab_instruments::InstrumentError>(())
//! ```

pub mod checksum;
pub mod config;
pub mod drivers;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod scpi;
pub mod traits;

pub use error::{AppResult, InstrumentError};
pub use hardware::{ResourceManager, Session, SessionConfig};
pub use scpi::{Dialect, SessionHandle, SharedSession};
pub use traits::{
    Function, Instrument, InstrumentGuard, Multimeter, MultimeterSetup, NetworkAnalyzer,
    Oscilloscope, PowerSupply, Range, Rate, SignalGenerator, TriggerSource,
};
