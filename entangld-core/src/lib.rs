//! entangld - a reactive dotted-path key-value store that federates subtrees
//! across peers.
//!
//! A [`Store`] holds a tree of leaves addressed by paths like `sensors.temp`.
//! Leaves are literals or getters; subscribers are called whenever a path is set.
//! Attaching a prefix to a peer makes every path under it live on that peer:
//! reads, writes and subscriptions are carried there as [`Message`]s by a
//! caller-supplied [`Transport`].
//!
//! ```no_run
//! use entangld_core::{Callback, LocalNetwork, Store, StoreConfig};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), entangld_core::StoreError> {
//! let network = LocalNetwork::new();
//! let local = Store::with_id("local", StoreConfig::default());
//! let remote = Store::with_id("remote", StoreConfig::default());
//! network.join(&local)?;
//! network.join(&remote)?;
//!
//! local.attach("other", remote.id().clone()).await?;
//! remote.set("x", json!(5)).await?;
//! assert_eq!(local.get("other.x").await?, json!(5));
//!
//! local
//!     .subscribe("other.x", Callback::new(|path, value| println!("{path} = {value}")))
//!     .await?;
//! remote.set("x", json!(9)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core_path;
pub mod core_router;
pub mod core_subscriptions;
pub mod logging;
pub mod metrics;
pub mod store;

pub use config::{Config, ConfigError, StoreConfig};
pub use core_path::{GetterError, Leaf, Path};
pub use core_router::{
    ChannelTransport, Envelope, LocalNetwork, Message, MessageKind, PeerId, Transport, TransportError,
};
pub use core_subscriptions::{Callback, SubscriptionId, SubscriptionInfo};
pub use logging::{init_logging, LogLevel};
pub use store::{Store, StoreError, StoreResult, Unsubscribe, WeakStore};

/// Set up logging and metric descriptions from a loaded configuration
pub fn init(config: &Config) -> Result<(), logging::LoggingError> {
    logging::init_logging_with_config(logging::LogConfig::from(&config.logging))?;
    if config.metrics.enabled {
        metrics::init_metrics();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        let _ = StoreConfig::default();
        let _ = Path::root();
    }
}
