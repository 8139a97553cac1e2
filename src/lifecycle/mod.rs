//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     Ctrl+C / SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Broadcast to background tasks (health monitor) → tasks exit their loops
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
