//! IMAP connection management.
//!
//! - Configuration (host, port, timeouts)
//! - TLS stream and dialing
//! - Framed, literal-aware I/O
//! - Type-state client

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Authenticated, Client, FetchStream, NotAuthenticated, Selected};
pub use config::{Config, ConfigBuilder, IMAPS_PORT};
pub use framed::FramedStream;
pub use stream::{ImapStream, connect_tls, create_tls_connector};
