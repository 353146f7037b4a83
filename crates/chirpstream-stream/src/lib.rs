//! chirpstream-stream: concurrent streaming connections.
//!
//! A [`StreamRegistry`] signs and opens one long-lived connection per
//! [`StreamDescription`], runs one worker task per connection that splits
//! the byte stream into lines, and merges everything into a single
//! [`EventStream`] of classified events and disconnect notifications.
//!
//! # Example
//! ```no_run
//! # async fn demo(opener: std::sync::Arc<dyn chirpstream_core::StreamOpener>) -> Result<(), Box<dyn std::error::Error>> {
//! use futures::StreamExt;
//! use chirpstream_core::Credentials;
//! use chirpstream_stream::{RegistryConfig, StreamDescription, StreamRegistry};
//!
//! let registry = StreamRegistry::new(opener, RegistryConfig::default());
//! let mut events = registry.events()?;
//! let creds = Credentials::new("ck", "cs").with_token("t", "ts");
//! registry.connect(creds, StreamDescription::track(["rust"])?).await?;
//! while let Some(item) = events.next().await {
//!     println!("{}: {:?}", item.connection, item.payload);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod description;
pub mod error;
pub mod events;
pub mod registry;
pub mod transport;

pub use config::{RegistryConfig, StreamEndpoints};
pub use connection::{ConnectionId, ConnectionState, DisconnectReason, StreamConnection};
pub use description::{BoundingBox, Parameter, StreamDescription, StreamDescriptionBuilder, StreamKind};
pub use error::{DescriptionError, RegistryError};
pub use events::{BlockingEvents, EventStream, StreamItem, StreamPayload};
pub use registry::StreamRegistry;
pub use transport::{LineBuffer, LineFault, RawLine};
