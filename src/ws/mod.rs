//! Core WebSocket infrastructure.
//!
//! This module provides generic connection management that can be
//! specialized for different message types using traits and the strategy
//! pattern. The envelope-typed [`crate::Client`] is the stock
//! specialization.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: Generic connection handle with explicit
//!   connect/disconnect intent, keepalive and fixed-delay reconnection
//! - [`MessageParser`]: Trait for decoding inbound frames
//!
//! # Example
//!
//! ```ignore
//! // Define your message type
//! #[derive(Clone, Debug, Deserialize)]
//! struct MyMessage { /* ... */ }
//!
//! let connection = ConnectionManager::new(endpoint, config, SimpleParser)?;
//! connection.connect()?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod traits;

pub use connection::{ConnectionManager, ConnectionState};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use traits::*;
