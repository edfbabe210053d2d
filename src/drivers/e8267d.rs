//! Keysight E8267D PSG vector signal generator.

use crate::error::AppResult;
use crate::hardware::{ResourceManager, Session, SessionConfig};
use crate::scpi::reply::{finite, parse_switch, switch};
use crate::scpi::{Dialect, SessionHandle, SharedSession};
use crate::traits::{Instrument, SignalGenerator, SignalOutput, SubUnit, SubUnits};

/// E8267D driver. The generator has a single RF output, number 1.
#[derive(Debug)]
pub struct E8267d {
    session: SharedSession,
    outputs: SubUnits<E8267dOutput>,
}

impl E8267d {
    pub const DIALECT: Dialect = Dialect {
        name: "Keysight E8267D",
        ..Dialect::IEEE488
    };

    /// Bind an open session, then reset, clear and enter remote.
    pub fn new(session: Session) -> AppResult<Self> {
        let session = super::connect(session, Self::DIALECT)?;
        let outputs = SubUnits::new(
            "E8267D output",
            [E8267dOutput {
                session: session.handle(),
            }],
        );
        let mut generator = Self { session, outputs };
        generator.initialize()?;
        Ok(generator)
    }

    pub fn open(
        manager: &ResourceManager,
        resource: &str,
        config: SessionConfig,
    ) -> AppResult<Self> {
        Self::new(manager.open(resource, config)?)
    }

    /// The RF output.
    pub fn rf(&self) -> AppResult<&E8267dOutput> {
        self.outputs.get(1)
    }
}

impl Instrument for E8267d {
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

impl SignalGenerator for E8267d {
    type Output = E8267dOutput;

    fn outputs(&self) -> &SubUnits<E8267dOutput> {
        &self.outputs
    }
}

/// RF output of an [`E8267d`].
#[derive(Debug, Clone)]
pub struct E8267dOutput {
    session: SessionHandle,
}

impl SubUnit for E8267dOutput {
    fn number(&self) -> u8 {
        1
    }
}

impl SignalOutput for E8267dOutput {
    fn is_enabled(&self) -> AppResult<bool> {
        let reply = self.session.query("OUTP:STAT?")?;
        parse_switch("OUTP:STAT?", &reply)
    }

    fn set_enabled(&self, enabled: bool) -> AppResult<()> {
        self.session
            .write(&format!("OUTP:STAT {}", switch(enabled)))
    }

    fn frequency(&self) -> AppResult<f64> {
        self.session.query_f64("SOUR:FREQ:CW?")
    }

    fn set_frequency(&self, hertz: f64) -> AppResult<()> {
        let hertz = finite("frequency", hertz)?;
        self.session.write(&format!("SOUR:FREQ:CW {hertz}"))
    }

    fn power(&self) -> AppResult<f64> {
        self.session.query_f64("SOUR:POW:LEV:IMM:AMPL?")
    }

    fn set_power(&self, dbm: f64) -> AppResult<()> {
        let dbm = finite("power", dbm)?;
        self.session
            .write(&format!("SOUR:POW:LEV:IMM:AMPL {dbm}"))
    }
}
