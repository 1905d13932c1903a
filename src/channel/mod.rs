//! Live-Update Channel
//!
//! Keeps a feed stream synchronized with server-side events in real time.
//!
//! ## Architecture
//!
//! - **Messages**: decodes raw channel payloads into typed events
//! - **Router**: maps event kinds to store actions
//! - **Manager**: owns the connection, reconnects with backoff, feeds the router
//! - **Transport**: async seam over the WebSocket client
//!
//! ## Data Flow
//!
//! ```text
//! WebSocket frame -> decode -> Event -> Router -> StreamStore::received_new_content
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use livefeed::channel::{ChannelManager, ManagerConfig, PageLocation, WsTransport};
//! use livefeed::store::FeedStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let page = PageLocation::parse("https://social.example.org/")?;
//!     let store = Arc::new(FeedStore::new("public"));
//!
//!     let manager = ChannelManager::new(
//!         ManagerConfig::default(),
//!         page,
//!         store.clone(),
//!         Arc::new(WsTransport::new()),
//!     );
//!     manager.start()?;
//!
//!     // ... later, when the application goes away
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

mod backoff;
mod endpoint;
mod error;
mod manager;
mod messages;
mod router;
mod state;
mod transport;

pub use backoff::{Backoff, BackoffConfig};
pub use endpoint::{ChannelScheme, ChannelUrl, PageLocation, PageScheme};
pub use error::{ChannelError, ChannelResult, DecodeError, TransportError};
pub use manager::{ChannelManager, ChannelStats, ManagerConfig};
pub use messages::{decode, decode_frame, Event, Frame, NEW_CONTENT};
pub use router::{Dispatch, Handler, Router};
pub use state::ConnectionState;
pub use transport::{Connection, Transport, WsConnection, WsTransport};
