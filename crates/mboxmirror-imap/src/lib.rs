//! # mboxmirror-imap
//!
//! A small IMAP client covering exactly what a mailbox mirror needs:
//! connect over implicit TLS, authenticate with LOGIN, list mailboxes,
//! open a mailbox read-only with EXAMINE and stream whole messages
//! (`FETCH n:m RFC822`) one at a time.
//!
//! ## Connection States
//!
//! The client uses the type-state pattern so that only valid commands are
//! callable in each protocol state:
//!
//! ```text
//! NotAuthenticated ── login() ──→ Authenticated ── examine() ──→ Selected
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use mboxmirror_imap::{Client, Config, SequenceSet};
//!
//! let config = Config::new("imap.example.com");
//! let stream = mboxmirror_imap::connection::connect_tls(&config).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.login("user", "secret").await?;
//! let (mut client, status) = client.examine("INBOX").await?;
//!
//! if let Some(range) = SequenceSet::range(1, status.exists) {
//!     let mut fetch = client.fetch_rfc822(&range).await?;
//!     while let Some(message) = fetch.next().await? {
//!         println!("{} bytes", message.rfc822.map_or(0, |m| m.len()));
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, TagGenerator};
pub use connection::{
    Authenticated, Client, Config, ConfigBuilder, FetchStream, FramedStream, ImapStream,
    NotAuthenticated, Selected,
};
pub use error::{Error, Result};
pub use parser::{FetchItem, FetchedMessage, Response, ResponseParser, UntaggedResponse};
pub use types::{ListResponse, Mailbox, MailboxStatus, SequenceSet, Status};
