//! Shared access to one synchronized session.
//!
//! A capability object and all of its channels, ports and measurement groups talk to the same
//! instrument through one session. The parent owns a [`SharedSession`]; every sub-unit holds a
//! [`SessionHandle`] clone. Both serialize access through the same mutex, so a query's write
//! and read can never be interleaved with another sub-unit's command.
//!
//! Only the owner can close the session. A handle has no `close`.

use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{AppResult, InstrumentError};
use crate::scpi::registers::{EventStatusFlags, ServiceRequestFlags};
use crate::scpi::reply::{parse_int, parse_switch};
use crate::scpi::synchronized::ScpiSession;

/// Non-owning, cloneable access to a synchronized session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<ScpiSession>>,
    endpoint: Arc<str>,
}

impl SessionHandle {
    fn with<R>(&self, f: impl FnOnce(&mut ScpiSession) -> AppResult<R>) -> AppResult<R> {
        let mut session = self
            .inner
            .lock()
            .map_err(|_| InstrumentError::SessionPoisoned(self.endpoint.to_string()))?;
        f(&mut session)
    }

    /// Endpoint address of the session.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Synchronized write.
    pub fn write(&self, command: &str) -> AppResult<()> {
        self.with(|s| s.write(command))
    }

    /// Query and return the trimmed reply.
    pub fn query(&self, command: &str) -> AppResult<String> {
        self.with(|s| s.query(command))
    }

    /// Query a floating point value.
    pub fn query_f64(&self, command: &str) -> AppResult<f64> {
        self.with(|s| s.query_f64(command))
    }

    /// Query an integer value.
    pub fn query_u32(&self, command: &str) -> AppResult<u32> {
        let reply = self.query(command)?;
        parse_int(command, &reply)
    }

    /// Query an `ON`/`OFF` setting.
    pub fn query_switch(&self, command: &str) -> AppResult<bool> {
        let reply = self.query(command)?;
        parse_switch(command, &reply)
    }

    /// Read one response line.
    pub fn read(&self) -> AppResult<String> {
        self.with(ScpiSession::read)
    }

    /// Operation complete (`*OPC?`).
    pub fn complete(&self) -> AppResult<bool> {
        self.with(ScpiSession::complete)
    }

    /// Identification string (`*IDN?`).
    pub fn identity(&self) -> AppResult<String> {
        self.with(ScpiSession::identity)
    }

    /// Status byte (`*STB?`).
    pub fn status(&self) -> AppResult<u8> {
        self.with(ScpiSession::status)
    }

    /// Installed options (`*OPT?`).
    pub fn options(&self) -> AppResult<String> {
        self.with(ScpiSession::options)
    }

    /// Standard Event Status Enable register.
    pub fn event_status_enable(&self) -> AppResult<u8> {
        self.with(ScpiSession::event_status_enable)
    }

    /// Write the Standard Event Status Enable register.
    pub fn set_event_status_enable(&self, value: u8) -> AppResult<()> {
        self.with(|s| s.set_event_status_enable(value))
    }

    /// Service Request Enable register.
    pub fn service_request_enable(&self) -> AppResult<u8> {
        self.with(ScpiSession::service_request_enable)
    }

    /// Write the Service Request Enable register.
    pub fn set_service_request_enable(&self, value: u8) -> AppResult<()> {
        self.with(|s| s.set_service_request_enable(value))
    }

    /// Pack and write event status enable flags.
    pub fn event_status_enable_select(&self, flags: EventStatusFlags) -> AppResult<()> {
        self.with(|s| s.event_status_enable_select(flags))
    }

    /// Pack and write service request enable flags.
    pub fn service_request_enable_select(&self, flags: ServiceRequestFlags) -> AppResult<()> {
        self.with(|s| s.service_request_enable_select(flags))
    }

    /// Software trigger (`*TRG`).
    pub fn trigger(&self) -> AppResult<()> {
        self.with(ScpiSession::trigger)
    }

    /// Clear status (`*CLS`).
    pub fn clear(&self) -> AppResult<()> {
        self.with(ScpiSession::clear)
    }

    /// Reset (`*RST`).
    pub fn reset(&self) -> AppResult<()> {
        self.with(ScpiSession::reset)
    }

    /// Whether commands are logged before sending.
    pub fn echo(&self) -> AppResult<bool> {
        self.with(|s| Ok(s.session().echo()))
    }

    /// Turn command echo on or off.
    pub fn set_echo(&self, echo: bool) -> AppResult<()> {
        self.with(|s| {
            s.session_mut().set_echo(echo);
            Ok(())
        })
    }

    /// Session timeout.
    pub fn timeout(&self) -> AppResult<Duration> {
        self.with(|s| Ok(s.session().timeout()))
    }

    /// Replace the session timeout.
    pub fn set_timeout(&self, timeout: Duration) -> AppResult<()> {
        self.with(|s| {
            s.session_mut().set_timeout(timeout);
            Ok(())
        })
    }

    /// Delay between the two halves of a query.
    pub fn query_delay(&self) -> AppResult<Duration> {
        self.with(|s| Ok(s.session().query_delay()))
    }

    /// Replace the query delay.
    pub fn set_query_delay(&self, delay: Duration) -> AppResult<()> {
        self.with(|s| {
            s.session_mut().set_query_delay(delay);
            Ok(())
        })
    }

    /// Read terminator.
    pub fn read_terminator(&self) -> AppResult<String> {
        self.with(|s| Ok(s.session().read_terminator().to_string()))
    }

    /// Replace the read terminator.
    pub fn set_read_terminator(&self, terminator: &str) -> AppResult<()> {
        self.with(|s| {
            s.session_mut().set_read_terminator(terminator);
            Ok(())
        })
    }

    /// Write terminator.
    pub fn write_terminator(&self) -> AppResult<String> {
        self.with(|s| Ok(s.session().write_terminator().to_string()))
    }

    /// Replace the write terminator.
    pub fn set_write_terminator(&self, terminator: &str) -> AppResult<()> {
        self.with(|s| {
            s.session_mut().set_write_terminator(terminator);
            Ok(())
        })
    }

    /// Whether the session is still open.
    pub fn is_open(&self) -> bool {
        self.with(|s| Ok(s.session().is_open())).unwrap_or(false)
    }
}

/// Owning side of a shared session.
///
/// Dereferences to [`SessionHandle`] for everything but [`close`](Self::close).
#[derive(Debug)]
pub struct SharedSession {
    handle: SessionHandle,
}

impl SharedSession {
    /// Take ownership of a synchronized session.
    pub fn new(session: ScpiSession) -> Self {
        let endpoint: Arc<str> = Arc::from(session.session().endpoint());
        Self {
            handle: SessionHandle {
                inner: Arc::new(Mutex::new(session)),
                endpoint,
            },
        }
    }

    /// A non-owning handle for a sub-unit.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Close the session for every holder.
    ///
    /// # Errors
    /// Returns [`InstrumentError::ClosedResource`] if it was already closed.
    pub fn close(&self) -> AppResult<()> {
        self.handle.with(ScpiSession::close)
    }
}

impl Deref for SharedSession {
    type Target = SessionHandle;

    fn deref(&self) -> &SessionHandle {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{MockTransport, Session};
    use crate::scpi::Dialect;

    fn shared(mock: MockTransport) -> SharedSession {
        let session = Session::from_transport(
            "MOCK::INSTR",
            Box::new(mock),
            Dialect::IEEE488.session_config(),
        );
        SharedSession::new(ScpiSession::new(session, Dialect::IEEE488))
    }

    #[test]
    fn handles_share_one_session() {
        let mock = MockTransport::new();
        let log = mock.handle();
        let owner = shared(mock);
        let channel = owner.handle();

        owner.write("CHAN1:STAT ON").unwrap();
        channel.write("CHAN2:STAT ON").unwrap();
        assert_eq!(
            log.commands_without_handshake(),
            vec!["CHAN1:STAT ON", "CHAN2:STAT ON"]
        );
    }

    #[test]
    fn close_is_seen_by_handles() {
        let owner = shared(MockTransport::new());
        let channel = owner.handle();

        owner.close().unwrap();
        assert!(!channel.is_open());
        assert!(matches!(
            channel.write("CHAN1:STAT ON"),
            Err(InstrumentError::ClosedResource(_))
        ));
        assert!(matches!(owner.close(), Err(InstrumentError::ClosedResource(_))));
    }

    #[test]
    fn queries_from_threads_are_not_interleaved() {
        let mock = MockTransport::new()
            .with_reply("CHAN1:SCAL?", "0.1")
            .with_reply("CHAN2:SCAL?", "0.2");
        let owner = shared(mock);

        let workers: Vec<_> = [(1, 0.1), (2, 0.2)]
            .into_iter()
            .map(|(n, expected)| {
                let handle = owner.handle();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let value = handle.query_f64(&format!("CHAN{n}:SCAL?")).unwrap();
                        assert_eq!(value, expected);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
    }

    #[test]
    fn session_properties_through_handle() {
        let owner = shared(MockTransport::new());
        let handle = owner.handle();
        handle.set_timeout(Duration::from_millis(900)).unwrap();
        handle.set_echo(true).unwrap();
        handle.set_read_terminator("\r\n").unwrap();
        assert_eq!(owner.timeout().unwrap(), Duration::from_millis(900));
        assert!(owner.echo().unwrap());
        assert_eq!(owner.read_terminator().unwrap(), "\r\n");
        assert_eq!(owner.endpoint(), "MOCK::INSTR");
    }
}
