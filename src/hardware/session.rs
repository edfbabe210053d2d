//! Transport session: terminator framing, query delay, timeout and echo over one channel.
//!
//! A [`Session`] owns exactly one [`Transport`]. It appends the write terminator to every
//! command, splits the incoming byte stream on the read terminator, and turns a silent
//! channel into [`InstrumentError::Timeout`] once the session timeout has elapsed.
//!
//! Bytes that arrive after a terminator stay buffered for the next `read`, so an instrument
//! that sends a value and its acknowledgment prompt in one burst is still read line by line.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::error::{AppResult, InstrumentError};
use crate::hardware::resource_manager::EndpointLease;
use crate::hardware::serial::DEFAULT_BAUD_RATE;
use crate::hardware::transport::{Connector, Transport};

/// Sleep between polls of a transport that has nothing to read.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Size of each transport read.
const READ_CHUNK: usize = 1024;

/// Framing parameters of a session.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use lab_instruments::hardware::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_timeout(Duration::from_millis(5000))
///     .with_read_terminator("\r\n");
/// assert_eq!(config.read_terminator, "\r\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delay between the write and the read of a query.
    pub query_delay: Duration,
    /// Deadline for a read, and for the completion handshake after a write.
    pub timeout: Duration,
    /// Appended to every command.
    pub write_terminator: String,
    /// Marks the end of every response.
    pub read_terminator: String,
    /// Log every command before sending it.
    pub echo: bool,
    /// Serial endpoints only.
    pub baud_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            query_delay: Duration::ZERO,
            timeout: Duration::from_millis(2000),
            write_terminator: "\n".to_string(),
            read_terminator: "\n".to_string(),
            echo: false,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl SessionConfig {
    /// Set the session timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the delay between the write and read halves of a query
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    /// Set write terminator character(s)
    pub fn with_write_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.write_terminator = terminator.into();
        self
    }

    /// Set read terminator character(s)
    pub fn with_read_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.read_terminator = terminator.into();
        self
    }

    /// Enable or disable command echo
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Set the serial baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// One open communication channel and its framing parameters.
pub struct Session {
    endpoint: String,
    transport: Option<Box<dyn Transport>>,
    config: SessionConfig,
    pending: Vec<u8>,
    _lease: Option<EndpointLease>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("open", &self.is_open())
            .field("config", &self.config)
            .finish()
    }
}

impl Session {
    /// Open `endpoint` through `connector`.
    ///
    /// # Errors
    /// Returns [`InstrumentError::Connection`] if the endpoint cannot be opened.
    pub fn open(
        connector: &dyn Connector,
        endpoint: &str,
        config: SessionConfig,
    ) -> AppResult<Self> {
        let transport = connector.open(endpoint, &config)?;
        debug!(endpoint, ?config.timeout, "Session opened");
        Ok(Self::from_transport(endpoint, transport, config))
    }

    /// Bind an already open transport.
    pub fn from_transport(
        endpoint: &str,
        transport: Box<dyn Transport>,
        config: SessionConfig,
    ) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            transport: Some(transport),
            config,
            pending: Vec::new(),
            _lease: None,
        }
    }

    pub(crate) fn with_lease(mut self, lease: EndpointLease) -> Self {
        self._lease = Some(lease);
        self
    }

    /// Endpoint address this session was opened on.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// False once [`close`](Self::close) has been called.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    fn transport(&mut self) -> AppResult<&mut Box<dyn Transport>> {
        self.transport
            .as_mut()
            .ok_or_else(|| InstrumentError::ClosedResource(self.endpoint.clone()))
    }

    /// Send `command` followed by the write terminator.
    pub fn write(&mut self, command: &str) -> AppResult<()> {
        if self.config.echo {
            info!(endpoint = %self.endpoint, "> {}", command);
        }
        trace!(endpoint = %self.endpoint, command, "write");

        let mut frame = Vec::with_capacity(command.len() + self.config.write_terminator.len());
        frame.extend_from_slice(command.as_bytes());
        frame.extend_from_slice(self.config.write_terminator.as_bytes());
        self.transport()?.write_all(&frame)
    }

    /// Send raw bytes with no terminator and no echo.
    pub fn write_raw(&mut self, bytes: &[u8]) -> AppResult<()> {
        trace!(endpoint = %self.endpoint, len = bytes.len(), "write raw");
        self.transport()?.write_all(bytes)
    }

    /// Block until one terminated response is available, returning it without the terminator.
    ///
    /// # Errors
    /// Returns [`InstrumentError::Timeout`] when no complete response arrives in time.
    pub fn read(&mut self) -> AppResult<String> {
        let deadline = Instant::now() + self.config.timeout;
        self.read_before(deadline)
    }

    /// [`read`](Self::read) bounded by an absolute deadline instead of the session timeout.
    ///
    /// The deadline holds even while bytes keep arriving; a stream that never carries the
    /// read terminator times out like a silent one. Unterminated bytes are discarded on
    /// timeout.
    pub fn read_before(&mut self, deadline: Instant) -> AppResult<String> {
        let terminator = self.config.read_terminator.clone();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = take_line(&mut self.pending, terminator.as_bytes()) {
                trace!(endpoint = %self.endpoint, response = %line, "read");
                return Ok(line);
            }

            let n = self.transport()?.read_chunk(&mut chunk)?;
            if n > 0 {
                self.pending.extend_from_slice(&chunk[..n]);
                if let Some(line) = take_line(&mut self.pending, terminator.as_bytes()) {
                    trace!(endpoint = %self.endpoint, response = %line, "read");
                    return Ok(line);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                let timeout = self.config.timeout;
                debug!(
                    endpoint = %self.endpoint,
                    ?timeout,
                    discarded = self.pending.len(),
                    "Read timed out"
                );
                self.pending.clear();
                return Err(InstrumentError::Timeout {
                    endpoint: self.endpoint.clone(),
                    operation: "read".to_string(),
                    timeout,
                });
            }
            if n == 0 {
                thread::sleep(POLL_INTERVAL.min(deadline - now));
            }
        }
    }

    /// Write `command`, wait the query delay, then read its response.
    ///
    /// Callers hold `&mut self` for the whole exchange, so no other command can be paired
    /// with this response.
    pub fn query(&mut self, command: &str) -> AppResult<String> {
        self.write(command)?;
        if !self.config.query_delay.is_zero() {
            thread::sleep(self.config.query_delay);
        }
        self.read()
    }

    /// Release the channel.
    ///
    /// # Errors
    /// Returns [`InstrumentError::ClosedResource`] if the session was already closed.
    pub fn close(&mut self) -> AppResult<()> {
        let mut transport = self
            .transport
            .take()
            .ok_or_else(|| InstrumentError::ClosedResource(self.endpoint.clone()))?;
        self.pending.clear();
        self._lease = None;
        debug!(endpoint = %self.endpoint, "Session closed");
        transport.close()
    }

    /// Current framing parameters.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Read terminator.
    pub fn read_terminator(&self) -> &str {
        &self.config.read_terminator
    }

    /// Replace the read terminator for subsequent reads.
    pub fn set_read_terminator(&mut self, terminator: impl Into<String>) {
        self.config.read_terminator = terminator.into();
    }

    /// Write terminator.
    pub fn write_terminator(&self) -> &str {
        &self.config.write_terminator
    }

    /// Replace the write terminator for subsequent writes.
    pub fn set_write_terminator(&mut self, terminator: impl Into<String>) {
        self.config.write_terminator = terminator.into();
    }

    /// Delay between the two halves of a query.
    pub fn query_delay(&self) -> Duration {
        self.config.query_delay
    }

    /// Replace the query delay.
    pub fn set_query_delay(&mut self, delay: Duration) {
        self.config.query_delay = delay;
    }

    /// Session timeout.
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Replace the session timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = timeout;
    }

    /// Whether commands are logged before they are sent.
    pub fn echo(&self) -> bool {
        self.config.echo
    }

    /// Turn command echo on or off.
    pub fn set_echo(&mut self, echo: bool) {
        self.config.echo = echo;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            debug!(endpoint = %self.endpoint, "Session dropped while open");
            let _ = transport.close();
        }
    }
}

/// Split the first terminated line off `pending`.
///
/// An empty terminator returns everything buffered as soon as anything arrived.
fn take_line(pending: &mut Vec<u8>, terminator: &[u8]) -> Option<String> {
    if terminator.is_empty() {
        if pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(pending).to_string();
        pending.clear();
        return Some(line);
    }

    let pos = pending
        .windows(terminator.len())
        .position(|window| window == terminator)?;
    let line = String::from_utf8_lossy(&pending[..pos]).to_string();
    pending.drain(..pos + terminator.len());
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::{MockConnector, MockTransport};
    use tracing_test::traced_test;

    fn session_with(mock: MockTransport, config: SessionConfig) -> Session {
        Session::from_transport("MOCK::INSTR", Box::new(mock), config)
    }

    #[test]
    fn write_appends_terminator() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let mut session =
            session_with(mock, SessionConfig::default().with_write_terminator("\r\n"));

        session.write("*RST").unwrap();
        assert_eq!(handle.raw_writes(), vec![b"*RST\r\n".to_vec()]);
    }

    #[test]
    fn query_strips_read_terminator() {
        let mock = MockTransport::new()
            .terminated_by("\r\n")
            .with_reply("*IDN?", "FLUKE,45,0,1.0");
        let mut session =
            session_with(mock, SessionConfig::default().with_read_terminator("\r\n"));

        assert_eq!(session.query("*IDN?").unwrap(), "FLUKE,45,0,1.0");
    }

    #[test]
    fn burst_is_read_line_by_line() {
        let mock = MockTransport::new()
            .terminated_by("\r\n")
            .with_ack_prompt("=>")
            .with_reply("VAL?", "+2.5E+0");
        let mut session =
            session_with(mock, SessionConfig::default().with_read_terminator("\r\n"));

        assert_eq!(session.query("VAL?").unwrap(), "+2.5E+0");
        assert_eq!(session.read().unwrap(), "=>");
    }

    #[test]
    fn terminator_change_affects_next_read() {
        let mock = MockTransport::new().terminated_by(";");
        let handle = mock.handle();
        let mut session = session_with(mock, SessionConfig::default());

        session.set_read_terminator(";");
        assert_eq!(session.read_terminator(), ";");
        handle.push_unsolicited("A;B;");
        assert_eq!(session.read().unwrap(), "A");
        assert_eq!(session.read().unwrap(), "B");
    }

    #[test]
    fn silent_transport_times_out() {
        let mock = MockTransport::new().silent();
        let mut session = session_with(
            mock,
            SessionConfig::default().with_timeout(Duration::from_millis(20)),
        );

        let err = session.query("*IDN?").unwrap_err();
        assert!(matches!(err, InstrumentError::Timeout { .. }));
    }

    /// Sends one byte per millisecond and never a terminator.
    struct Babbler;

    impl Transport for Babbler {
        fn write_all(&mut self, _bytes: &[u8]) -> AppResult<()> {
            Ok(())
        }

        fn read_chunk(&mut self, buf: &mut [u8]) -> AppResult<usize> {
            thread::sleep(Duration::from_millis(1));
            buf[0] = b'x';
            Ok(1)
        }

        fn close(&mut self) -> AppResult<()> {
            Ok(())
        }
    }

    #[test]
    fn unterminated_stream_times_out_on_schedule() {
        let mut session = Session::from_transport(
            "ASRL5::INSTR",
            Box::new(Babbler),
            SessionConfig::default().with_timeout(Duration::from_millis(50)),
        );

        let start = Instant::now();
        let err = session.query("MEAS?").unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, InstrumentError::Timeout { .. }));
        assert!(elapsed >= Duration::from_millis(50), "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "returned late: {elapsed:?}");
        assert!(session.pending.is_empty());
    }

    #[test]
    fn read_before_honours_an_earlier_deadline() {
        let mut session = session_with(
            MockTransport::new().silent(),
            SessionConfig::default().with_timeout(Duration::from_secs(5)),
        );

        let start = Instant::now();
        let err = session
            .read_before(start + Duration::from_millis(30))
            .unwrap_err();
        assert!(matches!(err, InstrumentError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn closed_session_rejects_operations() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let mut session = session_with(mock, SessionConfig::default());

        session.close().unwrap();
        assert!(handle.is_closed());
        assert!(!session.is_open());
        assert!(matches!(
            session.write("*RST"),
            Err(InstrumentError::ClosedResource(_))
        ));
        assert!(matches!(
            session.read(),
            Err(InstrumentError::ClosedResource(_))
        ));
    }

    #[test]
    fn second_close_is_a_fault() {
        let mut session = session_with(MockTransport::new(), SessionConfig::default());
        session.close().unwrap();
        assert!(matches!(
            session.close(),
            Err(InstrumentError::ClosedResource(_))
        ));
    }

    #[test]
    fn open_failure_is_connection_error() {
        let err = Session::open(
            &MockConnector::unreachable(),
            "ASRL99::INSTR",
            SessionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, InstrumentError::Connection { .. }));
    }

    #[test]
    fn query_delay_is_respected() {
        let mock = MockTransport::new().with_reply("MEAS?", "1");
        let mut session = session_with(
            mock,
            SessionConfig::default().with_query_delay(Duration::from_millis(15)),
        );

        let start = Instant::now();
        session.query("MEAS?").unwrap();
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[traced_test]
    #[test]
    fn echo_logs_commands() {
        let mut session = session_with(MockTransport::new(), SessionConfig::default());

        session.write("SILENT:CMD").unwrap();
        assert!(!logs_contain("> SILENT:CMD"));

        session.set_echo(true);
        session.write("ECHOED:CMD 3").unwrap();
        assert!(logs_contain("> ECHOED:CMD 3"));
    }

    #[test]
    fn take_line_handles_partial_terminator() {
        let mut pending = b"1.5\r".to_vec();
        assert_eq!(take_line(&mut pending, b"\r\n"), None);
        pending.extend_from_slice(b"\nrest");
        assert_eq!(take_line(&mut pending, b"\r\n"), Some("1.5".to_string()));
        assert_eq!(pending, b"rest".to_vec());
    }
}
