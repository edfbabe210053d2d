//! Transport layer: raw channels, framing sessions and endpoint bookkeeping.

pub mod mock;
pub mod resource_manager;
pub mod serial;
pub mod session;
pub mod transport;
pub mod visa;

pub use mock::{MockConnector, MockHandle, MockTransport};
pub use resource_manager::{ResourceManager, SystemConnector};
pub use serial::{SerialTransport, DEFAULT_BAUD_RATE};
pub use session::{Session, SessionConfig};
pub use transport::{Connector, Endpoint, Transport};
pub use visa::VisaTransport;
