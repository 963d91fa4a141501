//! Where fetched messages come from.

use std::future::Future;

use crate::error::Result;

/// One fetched message, exactly as the server sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage(Vec<u8>);

impl RawMessage {
    /// Wraps message bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The message bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for an empty message.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for RawMessage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A sequence of messages delivered one at a time.
pub trait MessageSource {
    /// Number of messages the source expects to deliver.
    fn total(&self) -> u32;

    /// Waits for the next message; `None` once the source is exhausted.
    fn next_message(&mut self) -> impl Future<Output = Result<Option<RawMessage>>> + Send;
}
