//! Resource manager: one open session per endpoint.
//!
//! Instruments are inherently single-session; two sessions on the same endpoint would pair one
//! caller's command with another caller's reply. The manager:
//!
//! - Opens transports through a [`Connector`]
//! - Refuses a second session on an endpoint that is already open
//! - Frees the endpoint when the session is closed or dropped
//!
//! # Example
//!
//! ```no_run
//! use lab_instruments::hardware::{ResourceManager, SessionConfig};
//!
//! let manager = ResourceManager::system();
//! let mut session = manager.open("ASRL/dev/ttyUSB0::INSTR", SessionConfig::default())?;
//! println!("{}", session.query("*IDN?")?);
//! session.close()?;
//! # Ok::<(), lab_instruments::InstrumentError>(())
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::error::{AppResult, InstrumentError};
use crate::hardware::serial::SerialTransport;
use crate::hardware::session::{Session, SessionConfig};
use crate::hardware::transport::{Connector, Endpoint, Transport};
use crate::hardware::visa::VisaTransport;

type Registry = Arc<Mutex<HashSet<String>>>;

/// Connector for real hardware: serial addresses go to `serialport`, the rest to VISA.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConnector;

impl Connector for SystemConnector {
    fn open(&self, address: &str, config: &SessionConfig) -> AppResult<Box<dyn Transport>> {
        match Endpoint::parse(address) {
            Endpoint::Serial(path) => {
                Ok(Box::new(SerialTransport::open(&path, config.baud_rate)?))
            }
            Endpoint::Visa(resource) => {
                Ok(Box::new(VisaTransport::open(&resource, config.timeout)?))
            }
        }
    }
}

/// Marks an endpoint as in use until dropped.
pub(crate) struct EndpointLease {
    endpoint: String,
    registry: Registry,
}

impl Drop for EndpointLease {
    fn drop(&mut self) {
        if let Ok(mut open) = self.registry.lock() {
            open.remove(&self.endpoint);
            trace!(endpoint = %self.endpoint, "Endpoint released");
        }
    }
}

/// Opens sessions and tracks which endpoints are in use.
#[derive(Clone)]
pub struct ResourceManager {
    connector: Arc<dyn Connector>,
    open: Registry,
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("open", &self.open_endpoints())
            .finish_non_exhaustive()
    }
}

impl ResourceManager {
    /// Manager backed by `connector`.
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
            open: Arc::default(),
        }
    }

    /// Manager backed by the [`SystemConnector`].
    pub fn system() -> Self {
        Self::new(SystemConnector)
    }

    /// Open a session on `endpoint`.
    ///
    /// Endpoints are tracked by their canonical address, so `ASRL7::INSTR` and `COM7` count
    /// as the same port.
    ///
    /// # Errors
    /// Returns [`InstrumentError::Connection`] if the endpoint is already open through this
    /// manager or the connector cannot reach it.
    pub fn open(&self, endpoint: &str, config: SessionConfig) -> AppResult<Session> {
        let address = endpoint.trim();
        let key = Endpoint::parse(address).canonical().to_string();
        {
            let mut open = self
                .open
                .lock()
                .map_err(|_| InstrumentError::SessionPoisoned(key.clone()))?;
            if !open.insert(key.clone()) {
                return Err(InstrumentError::Connection {
                    endpoint: address.to_string(),
                    reason: format!("a session is already open on {key}"),
                });
            }
        }

        // Constructed before opening so a failed open releases the endpoint again
        let lease = EndpointLease {
            endpoint: key.clone(),
            registry: Arc::clone(&self.open),
        };
        let session = Session::open(self.connector.as_ref(), address, config)?;
        debug!(endpoint = %address, canonical = %key, "Session registered");
        Ok(session.with_lease(lease))
    }

    /// Whether a session is currently open on `endpoint`.
    pub fn is_open(&self, endpoint: &str) -> bool {
        self.open
            .lock()
            .map(|open| open.contains(Endpoint::parse(endpoint).canonical()))
            .unwrap_or(false)
    }

    /// Canonical addresses with an open session, sorted.
    pub fn open_endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self
            .open
            .lock()
            .map(|open| open.iter().cloned().collect())
            .unwrap_or_default();
        endpoints.sort();
        endpoints
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.open.lock().map(|open| open.len()).unwrap_or(0)
    }
}
