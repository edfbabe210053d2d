//! Vendor drivers.
//!
//! Each SCPI driver publishes its wire conventions as a `DIALECT` constant and is built from an
//! open [`Session`]. Construction logs the instrument identity and performs the family's
//! start-up sequence (reset, clear, remote for multimeters, oscilloscopes and signal
//! generators).
//!
//! | Driver | Capability | Dialect |
//! |--------|------------|---------|
//! | [`Fluke45`] | Multimeter | `*OPC?` polling, `=>` prompt after every line |
//! | [`Hp34401a`] | Multimeter | `*OPC?` polling |
//! | [`Rto6`] | Oscilloscope | `*OPC?` polling |
//! | [`E8267d`] | SignalGenerator | `*OPC?` polling |
//! | [`N6700b`] | PowerSupply | `*OPC?` polling |
//! | [`Ms464xb`] | NetworkAnalyzer | chained `;*OPC?` |
//! | [`SerialDac`] | binary frames | none |

pub mod dac;
pub mod e8267d;
pub mod fluke45;
pub mod hp34401a;
pub mod ms464xb;
pub mod n6700b;
pub mod rto6;

pub use dac::SerialDac;
pub use e8267d::{E8267d, E8267dOutput};
pub use fluke45::Fluke45;
pub use hp34401a::Hp34401a;
pub use ms464xb::{Ms464xb, Ms464xbPort};
pub use n6700b::{N6700b, N6700bOutput, PriorityMode};
pub use rto6::{HorizontalScaleMode, Rto6, Rto6Channel, Rto6Math, Rto6Measurement, ZoomWindow};

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppResult, InstrumentError};
use crate::hardware::{ResourceManager, Session, SessionConfig};
use crate::scpi::{Dialect, ScpiSession, SharedSession};
use crate::traits::Multimeter;

/// Wrap `session` in the synchronized layer and log who answered.
pub(crate) fn connect(session: Session, dialect: Dialect) -> AppResult<SharedSession> {
    let shared = SharedSession::new(ScpiSession::new(session, dialect));
    let identity = shared.identity()?;
    info!(
        endpoint = shared.endpoint(),
        dialect = dialect.name,
        identity = %identity,
        "Instrument connected"
    );
    Ok(shared)
}

/// Every supported driver, as named in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    Fluke45,
    Hp34401a,
    Rto6,
    E8267d,
    N6700b,
    Ms464xb,
    Dac,
}

impl DriverKind {
    pub const ALL: [DriverKind; 7] = [
        DriverKind::Fluke45,
        DriverKind::Hp34401a,
        DriverKind::Rto6,
        DriverKind::E8267d,
        DriverKind::N6700b,
        DriverKind::Ms464xb,
        DriverKind::Dac,
    ];

    /// Wire conventions; `None` for the binary DAC.
    pub fn dialect(self) -> Option<Dialect> {
        match self {
            DriverKind::Fluke45 => Some(Fluke45::DIALECT),
            DriverKind::Hp34401a => Some(Hp34401a::DIALECT),
            DriverKind::Rto6 => Some(Rto6::DIALECT),
            DriverKind::E8267d => Some(E8267d::DIALECT),
            DriverKind::N6700b => Some(N6700b::DIALECT),
            DriverKind::Ms464xb => Some(Ms464xb::DIALECT),
            DriverKind::Dac => None,
        }
    }

    /// Default session parameters for this driver.
    pub fn session_config(self) -> SessionConfig {
        match self.dialect() {
            Some(dialect) => dialect.session_config(),
            None => SessionConfig::default(),
        }
    }

    /// Capability family, for listings.
    pub fn capability(self) -> &'static str {
        match self {
            DriverKind::Fluke45 | DriverKind::Hp34401a => "multimeter",
            DriverKind::Rto6 => "oscilloscope",
            DriverKind::E8267d => "signal generator",
            DriverKind::N6700b => "power supply",
            DriverKind::Ms464xb => "network analyzer",
            DriverKind::Dac => "dac",
        }
    }

    /// Name as written in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            DriverKind::Fluke45 => "fluke45",
            DriverKind::Hp34401a => "hp34401a",
            DriverKind::Rto6 => "rto6",
            DriverKind::E8267d => "e8267d",
            DriverKind::N6700b => "n6700b",
            DriverKind::Ms464xb => "ms464xb",
            DriverKind::Dac => "dac",
        }
    }

    /// Whether the driver talks SCPI text, as opposed to binary frames.
    pub fn is_scpi(self) -> bool {
        self.dialect().is_some()
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for DriverKind {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DriverKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| InstrumentError::invalid_choice("driver", s))
    }
}

/// Open a multimeter of the given kind behind the [`Multimeter`] trait.
///
/// # Errors
/// [`InstrumentError::InvalidChoice`] if `kind` is not a multimeter driver.
pub fn open_multimeter(
    kind: DriverKind,
    manager: &ResourceManager,
    resource: &str,
    config: SessionConfig,
) -> AppResult<Box<dyn Multimeter>> {
    match kind {
        DriverKind::Fluke45 => Ok(Box::new(Fluke45::open(manager, resource, config)?)),
        DriverKind::Hp34401a => Ok(Box::new(Hp34401a::open(manager, resource, config)?)),
        other => Err(InstrumentError::invalid_choice("multimeter driver", other.name())),
    }
}

/// Open `resource` with `kind`'s dialect and return the bare synchronized session.
///
/// No start-up sequence is sent, which makes this suitable for identification.
pub fn open_scpi(
    kind: DriverKind,
    manager: &ResourceManager,
    resource: &str,
    config: SessionConfig,
) -> AppResult<SharedSession> {
    let dialect = kind
        .dialect()
        .ok_or_else(|| InstrumentError::invalid_choice("SCPI driver", kind.name()))?;
    let session = manager.open(resource, config)?;
    Ok(SharedSession::new(ScpiSession::new(session, dialect)))
}
