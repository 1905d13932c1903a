//! # Livefeed
//!
//! Live-update channel for a social feed stream. Keeps the client's view of
//! a stream in sync with the server by listening on a persistent WebSocket
//! channel and turning its events into store actions.
//!
//! ## Features
//!
//! - **Resilient connection**: automatic reconnect with bounded exponential backoff
//! - **Strict ordering**: messages are decoded and dispatched one at a time, in arrival order
//! - **Forward compatible**: unknown event kinds are ignored, not errors
//! - **Clean teardown**: no store action runs once the channel is stopped
//!
//! ## Modules
//!
//! - [`channel`]: Codec, router and connection manager
//! - [`store`]: Store capabilities used by the channel and an in-memory feed store
//! - [`config`]: TOML configuration with environment overrides

pub mod channel;
pub mod config;
pub mod store;

pub use channel::{
    BackoffConfig, ChannelError, ChannelManager, ChannelResult, ChannelStats, ChannelUrl,
    ConnectionState, DecodeError, Dispatch, Event, ManagerConfig, PageLocation, Router,
    Transport, TransportError, WsTransport,
};

pub use config::{ChannelConfig, Config, ConfigError, LoggingConfig};

pub use store::{FeedStore, StreamStore};
