//! Per-vendor protocol constants consumed by the synchronized command layer.

use std::time::Duration;

use crate::hardware::SessionConfig;

/// How a write waits for the instrument to finish executing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Query `*OPC?` after the write until it reports `1` or the session timeout elapses.
    PollOpc,
    /// Send `command;*OPC?` as one query and read the completion reply.
    ChainedOpc,
    /// Follow the write with `*WAI` and let the instrument hold off later commands.
    Wait,
    /// Send the write alone; the instrument serializes commands itself.
    Implicit,
}

/// Wire conventions of one instrument family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Human readable family name, used in logs.
    pub name: &'static str,
    /// Appended to every command.
    pub write_terminator: &'static str,
    /// Ends every reply.
    pub read_terminator: &'static str,
    /// Default session timeout.
    pub timeout: Duration,
    /// Completion handshake after writes.
    pub completion: CompletionPolicy,
    /// Read and discard one acknowledgment line after every write.
    pub post_write_ack_read: bool,
    /// Read and discard one acknowledgment line after every query reply.
    pub post_query_ack_read: bool,
}

impl Dialect {
    /// Plain IEEE 488.2 instrument: newline framing, `*OPC?` polling, no acknowledgments.
    pub const IEEE488: Dialect = Dialect {
        name: "IEEE 488.2",
        write_terminator: "\n",
        read_terminator: "\n",
        timeout: Duration::from_millis(2000),
        completion: CompletionPolicy::PollOpc,
        post_write_ack_read: false,
        post_query_ack_read: false,
    };

    /// Session parameters matching this dialect.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_timeout(self.timeout)
            .with_write_terminator(self.write_terminator)
            .with_read_terminator(self.read_terminator)
    }

    /// Same dialect with a different completion policy.
    pub fn with_completion(mut self, completion: CompletionPolicy) -> Self {
        self.completion = completion;
        self
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::IEEE488
    }
}
