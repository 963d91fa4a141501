//! # mboxmirror-core
//!
//! Incremental mirroring of an IMAP mailbox into an mbox archive.
//!
//! A run pulls messages one at a time and pushes each through
//!
//! ```text
//! envelope::resolve ──→ FilterContext::filter ──→ archive::serialize ──→ .mbox
//!                               │
//!                               └── IdentifierSet ──→ .yaml sidecar
//! ```
//!
//! while reporting status and progress to a [`Renderer`] running on the
//! invoking task.
//!
//! This crate provides:
//! - Envelope date resolution with ordered date-grammar fallbacks
//! - Freshness and duplicate filtering
//! - The mbox entry format, with `From ` escaping
//! - The identifier sidecar
//! - A supervised worker with a status/progress channel and terminal renderer
//! - Logging and bandwidth-metering stream decorators
//! - IMAP glue: login, mailbox listing and streaming fetch

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod archive;
pub mod envelope;
mod error;
pub mod filter;
pub mod header;
pub mod idstore;
pub mod instrument;
pub mod mirror;
pub mod progress;
pub mod service;
pub mod source;
pub mod time;

pub use account::Account;
pub use archive::{ArchiveMode, ArchiveWriter};
pub use envelope::{DateGrammar, DateSource, EnvelopeDate};
pub use error::{Error, Result};
pub use filter::{
    FilterContext, FilterDecision, FreshnessWindow, MissingIdPolicy, RejectReason, RunMode,
};
pub use idstore::IdentifierSet;
pub use instrument::{BandwidthMonitor, BoxedStream, ByteStream, Instrumentation};
pub use mirror::{MirrorOptions, MirrorRun, MirrorSummary, run_mirror};
pub use progress::{ProgressEvent, RenderOutcome, Renderer, Reporter, spawn_worker};
pub use service::{AuthClient, ImapSource, connect_and_login, list_account, mirror_mailbox};
pub use source::{MessageSource, RawMessage};
