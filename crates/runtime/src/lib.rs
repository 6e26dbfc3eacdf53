//! rcstream runtime - realtime config stream management
//!
//! This crate keeps a single long-lived HTTP stream open to the realtime
//! config backend while anyone is listening, and reconnects with randomized
//! exponential backoff when it drops:
//!
//! - **Connection manager**: listener registry and the connection state machine
//! - **Retry policy**: jittered backoff with a bounded retry budget
//! - **Request building**: URL, headers and body for each open attempt
//! - **Sessions**: exclusive ownership of the open stream, read-only views for consumers
//! - **Transport**: streaming HTTP over `reqwest`, swappable for tests
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │ ConnectionManager │  listeners, state machine, worker task
//! │  ┌─────────────┐  │
//! │  │ RetryPolicy │  │  backoff + budget
//! │  └─────────────┘  │
//! │  ┌─────────────┐  │
//! │  │ RequestBldr │  │  per-attempt request
//! │  └─────────────┘  │
//! └─────────┬─────────┘
//!           │ StreamTransport::open
//! ┌─────────▼─────────┐        ┌──────────────────┐
//! │      Session      │───────►│ AutoFetchConsumer│  reads bytes, notifies
//! └───────────────────┘        └──────────────────┘  listeners, reports end
//! ```
//!
//! # Collaborators
//!
//! The manager never parses stream content or fetches configs. Template
//! versions, installation tokens, platform identity and update handling come
//! in through the traits in [`provider`] and [`session::AutoFetchConsumer`].

pub mod config;
pub mod connection;
pub mod error;
pub mod listener;
pub mod provider;
pub mod request;
pub mod retry;
pub mod session;
pub mod transport;

// Re-export key types at crate root
pub use config::{DEFAULT_NAMESPACE, DEFAULT_OPEN_TIMEOUT, DEFAULT_TOKEN_TIMEOUT, ManagerConfig};
pub use connection::{Collaborators, ConnectionManager, ConnectionState, ConnectionStats};
pub use error::{Error, ErrorKind, Result};
pub use listener::{Listener, ListenerId, ListenerRegistration, Listeners};
pub use provider::{
	BoxFuture, InstallationAuth, PlatformIdentity, StaticIdentity, StaticToken, StaticVersion,
	TemplateVersionSource,
};
pub use request::{RequestBuilder, RequestContext, StreamRequest};
pub use retry::{DEFAULT_MAX_RETRIES, RetryConfig, RetryPolicy, RetrySnapshot};
pub use session::{AutoFetchConsumer, SessionEnd, SessionEnded, SessionId, SessionStream};
pub use transport::{ByteStream, HttpTransport, StreamTransport};
