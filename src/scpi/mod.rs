//! Synchronized command layer: completion handshakes, IEEE 488.2 common commands and the
//! per-vendor dialect table.

pub mod dialect;
pub mod registers;
pub mod reply;
pub mod shared;
pub mod synchronized;

pub use dialect::{CompletionPolicy, Dialect};
pub use registers::{EventStatusFlags, ServiceRequestFlags};
pub use shared::{SessionHandle, SharedSession};
pub use synchronized::ScpiSession;
