//! Synchronized command layer.
//!
//! [`ScpiSession`] wraps a [`Session`] so that every write returns only after the instrument
//! has finished executing it. Several vendor protocols silently drop or corrupt a command that
//! arrives while the previous one is still running; waiting for operation complete after each
//! write rules that out.
//!
//! The handshake and the acknowledgment reads are taken from the session's [`Dialect`], so the
//! layer itself stays protocol-agnostic:
//!
//! | Policy | Wire traffic after `write("X")` |
//! |--------|---------------------------------|
//! | `PollOpc` | `X`, then `*OPC?` until it answers `1` |
//! | `ChainedOpc` | `X;*OPC?` and one reply |
//! | `Wait` | `X`, `*WAI` |
//! | `Implicit` | `X` |
//!
//! On top of that the layer exposes the IEEE 488.2 common commands (`*IDN?`, `*STB?`, `*OPT?`,
//! `*OPC?`, `*ESE`, `*SRE`, `*TRG`, `*CLS`, `*RST`).

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{AppResult, InstrumentError};
use crate::hardware::Session;
use crate::scpi::dialect::{CompletionPolicy, Dialect};
use crate::scpi::registers::{EventStatusFlags, ServiceRequestFlags};
use crate::scpi::reply::{parse_f64, parse_int};

/// Pause between `*OPC?` polls that reported "not yet".
const OPC_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A session whose writes wait for operation complete.
#[derive(Debug)]
pub struct ScpiSession {
    session: Session,
    dialect: Dialect,
}

impl ScpiSession {
    /// Wrap `session` using the conventions of `dialect`.
    pub fn new(session: Session, dialect: Dialect) -> Self {
        debug!(endpoint = session.endpoint(), dialect = dialect.name, "Synchronized session");
        Self { session, dialect }
    }

    /// The wrapped transport session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access to terminators, delay, timeout and echo.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Protocol conventions in effect.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Send `command` and block until the instrument reports it complete.
    ///
    /// # Errors
    /// Returns [`InstrumentError::Timeout`] if completion is not reported within the session
    /// timeout.
    pub fn write(&mut self, command: &str) -> AppResult<()> {
        match self.dialect.completion {
            CompletionPolicy::PollOpc => {
                self.write_unsynchronized(command)?;
                self.wait_complete()
            }
            CompletionPolicy::ChainedOpc => {
                let reply = self.query(&format!("{command};*OPC?"))?;
                if is_complete(&reply) {
                    Ok(())
                } else {
                    self.wait_complete()
                }
            }
            CompletionPolicy::Wait => {
                self.write_unsynchronized(command)?;
                self.write_unsynchronized("*WAI")
            }
            CompletionPolicy::Implicit => self.write_unsynchronized(command),
        }
    }

    /// Session write plus the dialect's acknowledgment read, without any handshake.
    fn write_unsynchronized(&mut self, command: &str) -> AppResult<()> {
        self.session.write(command)?;
        if self.dialect.post_write_ack_read {
            let ack = self.session.read()?;
            trace!(endpoint = self.session.endpoint(), %ack, "Discarded write acknowledgment");
        }
        Ok(())
    }

    /// Poll `*OPC?` until it reports `1`.
    ///
    /// The whole handshake, including each poll's reply, shares one session timeout.
    fn wait_complete(&mut self) -> AppResult<()> {
        let timeout = self.session.timeout();
        let deadline = Instant::now() + timeout;
        let expired = |endpoint: &str| InstrumentError::Timeout {
            endpoint: endpoint.to_string(),
            operation: "operation complete".to_string(),
            timeout,
        };

        loop {
            match self.poll_complete(deadline) {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(InstrumentError::Timeout { .. }) => {
                    return Err(expired(self.session.endpoint()))
                }
                Err(e) => return Err(e),
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(expired(self.session.endpoint()));
            }
            thread::sleep(OPC_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// One `*OPC?` exchange whose reads end at `deadline`.
    fn poll_complete(&mut self, deadline: Instant) -> AppResult<bool> {
        self.session.write("*OPC?")?;
        let delay = self.session.query_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let reply = self.session.read_before(deadline)?;
        if self.dialect.post_query_ack_read {
            let ack = self.session.read_before(deadline)?;
            trace!(endpoint = self.session.endpoint(), %ack, "Discarded query acknowledgment");
        }
        Ok(is_complete(reply.trim()))
    }

    /// Send a query and return its reply, trimmed.
    ///
    /// Dialects with `post_query_ack_read` have one extra line read and discarded.
    pub fn query(&mut self, command: &str) -> AppResult<String> {
        let reply = self.session.query(command)?;
        if self.dialect.post_query_ack_read {
            let ack = self.session.read()?;
            trace!(endpoint = self.session.endpoint(), %ack, "Discarded query acknowledgment");
        }
        Ok(reply.trim().to_string())
    }

    /// Query and parse a floating point reply.
    pub fn query_f64(&mut self, command: &str) -> AppResult<f64> {
        let reply = self.query(command)?;
        parse_f64(command, &reply)
    }

    /// Read one response line.
    pub fn read(&mut self) -> AppResult<String> {
        self.session.read()
    }

    /// Operation complete (`*OPC?`).
    pub fn complete(&mut self) -> AppResult<bool> {
        let reply = self.query("*OPC?")?;
        Ok(is_complete(&reply))
    }

    /// Identification string (`*IDN?`).
    pub fn identity(&mut self) -> AppResult<String> {
        self.query("*IDN?")
    }

    /// Status byte (`*STB?`).
    pub fn status(&mut self) -> AppResult<u8> {
        let reply = self.query("*STB?")?;
        parse_int("*STB?", &reply)
    }

    /// Installed options (`*OPT?`).
    pub fn options(&mut self) -> AppResult<String> {
        self.query("*OPT?")
    }

    /// Standard Event Status Enable register (`*ESE?`).
    pub fn event_status_enable(&mut self) -> AppResult<u8> {
        let reply = self.query("*ESE?")?;
        parse_int("*ESE?", &reply)
    }

    /// Write the Standard Event Status Enable register.
    pub fn set_event_status_enable(&mut self, value: u8) -> AppResult<()> {
        self.write(&format!("*ESE {value}"))
    }

    /// Service Request Enable register (`*SRE?`).
    pub fn service_request_enable(&mut self) -> AppResult<u8> {
        let reply = self.query("*SRE?")?;
        parse_int("*SRE?", &reply)
    }

    /// Write the Service Request Enable register.
    pub fn set_service_request_enable(&mut self, value: u8) -> AppResult<()> {
        self.write(&format!("*SRE {value}"))
    }

    /// Pack named event flags and write them to `*ESE`.
    pub fn event_status_enable_select(&mut self, flags: EventStatusFlags) -> AppResult<()> {
        self.set_event_status_enable(flags.bits())
    }

    /// Pack named service request flags and write them to `*SRE`.
    pub fn service_request_enable_select(&mut self, flags: ServiceRequestFlags) -> AppResult<()> {
        self.set_service_request_enable(flags.bits())
    }

    /// Software trigger (`*TRG`).
    pub fn trigger(&mut self) -> AppResult<()> {
        self.write("*TRG")
    }

    /// Clear status (`*CLS`).
    pub fn clear(&mut self) -> AppResult<()> {
        self.write("*CLS")
    }

    /// Reset (`*RST`).
    pub fn reset(&mut self) -> AppResult<()> {
        self.write("*RST")
    }

    /// Close the underlying session.
    pub fn close(&mut self) -> AppResult<()> {
        self.session.close()
    }
}

fn is_complete(reply: &str) -> bool {
    parse_int::<i64>("*OPC?", reply).map(|v| v == 1).unwrap_or(false)
}
