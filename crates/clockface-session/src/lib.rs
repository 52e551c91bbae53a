//! clockface-session: async capture sessions over the clockface core.
//!
//! A session polls a detector probe on a fixed interval, feeds each detection
//! through the frame pipeline and streams per-frame outcomes to the caller
//! until an identity is confirmed. Also hosts the configuration layer and the
//! SQLite roster store.

pub mod config;
pub mod probe;
pub mod session;
pub mod store;

pub use config::{ConfigError, SessionConfig};
pub use probe::{BlockingProbe, FaceProbe, ProbeError, ReplayProbe};
pub use session::{spawn_session, SessionEnd, SessionError, SessionHandle};
pub use store::{EnrollmentInfo, RosterStore, StoreError};
