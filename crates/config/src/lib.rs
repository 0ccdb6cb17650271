// Relay configuration and persisted session state

pub mod session;
pub mod settings;

pub use session::{generate_session_id, SessionRecord, SessionStore};
pub use settings::{ConfigError, FallbackPolicy, RelayConfig};
