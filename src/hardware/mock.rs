//! Mock transport for testing without physical hardware.
//!
//! A [`MockTransport`] behaves like a well-mannered SCPI instrument: it splits incoming bytes
//! into command lines, logs each one, and queues replies.
//!
//! - `*OPC?` (alone or chained, `cmd;*OPC?`) answers `1`
//! - other queries answer their scripted reply, or `0` when none was scripted
//! - an optional acknowledgment prompt (the Fluke 45 `=>`) follows every line
//! - silent mode never answers, for timeout tests
//!
//! The transport is moved into a session, so tests keep a [`MockHandle`] that shares its state.
//!
//! # Example
//!
//! ```
//! use lab_instruments::hardware::MockTransport;
//!
//! let mock = MockTransport::new().with_reply("READ?", "+1.000E-3");
//! let handle = mock.handle();
//! assert!(handle.commands().is_empty());
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{AppResult, InstrumentError};
use crate::hardware::session::SessionConfig;
use crate::hardware::transport::{Connector, Transport};

#[derive(Debug)]
struct MockState {
    incoming: Vec<u8>,
    outgoing: VecDeque<u8>,
    raw_writes: Vec<Vec<u8>>,
    commands: Vec<String>,
    replies: HashMap<String, VecDeque<String>>,
    default_reply: String,
    reply_terminator: String,
    ack_prompt: Option<String>,
    silent: bool,
    fail_next_write: bool,
    closed: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            incoming: Vec::new(),
            outgoing: VecDeque::new(),
            raw_writes: Vec::new(),
            commands: Vec::new(),
            replies: HashMap::new(),
            default_reply: "0".to_string(),
            reply_terminator: "\n".to_string(),
            ack_prompt: None,
            silent: false,
            fail_next_write: false,
            closed: false,
        }
    }
}

impl MockState {
    fn receive(&mut self, bytes: &[u8]) {
        self.raw_writes.push(bytes.to_vec());
        self.incoming.extend_from_slice(bytes);
        while let Some(pos) = self.incoming.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.incoming.drain(..=pos).collect();
            let command = String::from_utf8_lossy(&line)
                .trim_end_matches(['\r', '\n'])
                .to_string();
            self.respond(command);
        }
    }

    fn respond(&mut self, command: String) {
        let reply = if command.contains('?') {
            Some(self.reply_for(&command))
        } else {
            None
        };
        self.commands.push(command);

        if self.silent {
            return;
        }
        if let Some(reply) = reply {
            self.queue(reply);
        }
        if let Some(ack) = self.ack_prompt.clone() {
            self.queue(ack);
        }
    }

    fn reply_for(&mut self, command: &str) -> String {
        if let Some(queue) = self.replies.get_mut(command) {
            if queue.len() > 1 {
                if let Some(reply) = queue.pop_front() {
                    return reply;
                }
            }
            if let Some(reply) = queue.front() {
                return reply.clone();
            }
        }
        if command.ends_with("*OPC?") {
            return "1".to_string();
        }
        self.default_reply.clone()
    }

    fn queue(&mut self, reply: String) {
        self.outgoing.extend(reply.into_bytes());
        self.outgoing.extend(self.reply_terminator.as_bytes().iter().copied());
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    // A panicking test must not cascade into every other assertion
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Simulated instrument channel.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a mock that answers `*OPC?` with `1` and everything else with `0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the reply to an exact query line.
    pub fn with_reply(self, query: &str, reply: &str) -> Self {
        self.handle().set_reply(query, reply);
        self
    }

    /// Script a sequence of replies; the last one repeats once the others are used up.
    pub fn with_replies(self, query: &str, replies: &[&str]) -> Self {
        lock(&self.state).replies.insert(
            query.to_string(),
            replies.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    /// Reply terminator appended to every queued reply.
    pub fn terminated_by(self, terminator: &str) -> Self {
        lock(&self.state).reply_terminator = terminator.to_string();
        self
    }

    /// Queue `prompt` after every received line.
    pub fn with_ack_prompt(self, prompt: &str) -> Self {
        lock(&self.state).ack_prompt = Some(prompt.to_string());
        self
    }

    /// Never answer anything.
    pub fn silent(self) -> Self {
        lock(&self.state).silent = true;
        self
    }

    /// A handle that observes and scripts this transport after it has been moved.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, bytes: &[u8]) -> AppResult<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(InstrumentError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "mock transport closed",
            )));
        }
        if std::mem::take(&mut state.fail_next_write) {
            return Err(InstrumentError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "Injected failure",
            )));
        }
        state.receive(bytes);
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> AppResult<usize> {
        let mut state = lock(&self.state);
        let n = buf.len().min(state.outgoing.len());
        for (slot, byte) in buf.iter_mut().zip(state.outgoing.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn close(&mut self) -> AppResult<()> {
        lock(&self.state).closed = true;
        Ok(())
    }
}

/// Shared view of a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Every command line received so far, without terminators.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.state).commands.clone()
    }

    /// Received command lines excluding `*OPC?` handshake polls.
    pub fn commands_without_handshake(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c != "*OPC?")
            .collect()
    }

    /// Every `write_all` call, byte for byte.
    pub fn raw_writes(&self) -> Vec<Vec<u8>> {
        lock(&self.state).raw_writes.clone()
    }

    /// Forget everything received so far.
    pub fn clear_log(&self) {
        let mut state = lock(&self.state);
        state.commands.clear();
        state.raw_writes.clear();
    }

    /// Script the reply to an exact query line.
    pub fn set_reply(&self, query: &str, reply: &str) {
        lock(&self.state)
            .replies
            .insert(query.to_string(), VecDeque::from([reply.to_string()]));
    }

    /// Queue raw reply text, terminator included, as if the instrument sent it unprompted.
    pub fn push_unsolicited(&self, text: &str) {
        lock(&self.state).outgoing.extend(text.as_bytes().iter().copied());
    }

    /// Make the next write fail with an I/O error.
    pub fn inject_next_failure(&self) {
        lock(&self.state).fail_next_write = true;
    }

    /// Whether the session closed the transport.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

/// Connector that hands out mock transports, or refuses every address.
#[derive(Debug, Default)]
pub struct MockConnector {
    template: Option<Arc<Mutex<MockState>>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    /// Every `open` returns a transport sharing `mock`'s state.
    pub fn new(mock: &MockTransport) -> Self {
        Self {
            template: Some(Arc::clone(&mock.state)),
            opened: Arc::default(),
        }
    }

    /// Every `open` fails with a connection error.
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Addresses opened so far.
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|o| o.clone())
            .unwrap_or_default()
    }
}

impl Connector for MockConnector {
    fn open(&self, address: &str, _config: &SessionConfig) -> AppResult<Box<dyn Transport>> {
        let state = self
            .template
            .as_ref()
            .ok_or_else(|| InstrumentError::Connection {
                endpoint: address.to_string(),
                reason: "no such device".to_string(),
            })?;
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(address.to_string());
        }
        lock(state).closed = false;
        Ok(Box::new(MockTransport {
            state: Arc::clone(state),
        }))
    }
}
