//! Session facade and its configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Public API over one game session |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ClientOptions`] | Timeouts, command prefix and acknowledgement tokens |
//!
//! # Example
//!
//! ```no_run
//! use pilaf_client::{BridgeTransport, Client, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = Client::builder()
//!     .host("localhost")
//!     .transport(BridgeTransport::local()?)
//!     .build()?;
//!
//! client.connect().await?;
//! client.equip_item("shield", "offhand")?;
//! assert!(client.has_item("shield", "offhand"));
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Session facade and transport event dispatcher.
pub mod core;

/// Client timing and command options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use core::Client;
pub use options::ClientOptions;
