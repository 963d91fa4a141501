//! Type-state IMAP client connection.
//!
//! The IMAP connection states are:
//!
//! - `NotAuthenticated`: Initial state after connection
//! - `Authenticated`: After successful LOGIN
//! - `Selected`: After successful EXAMINE
//!
//! Each state only exposes methods that are valid for that state.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

pub use self::selected::FetchStream;
pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser};
use crate::types::Status;
use crate::{Error, Result};

/// IMAP client connection with type-state.
///
/// The type parameter `State` tracks the connection state at compile time.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<String>,
    pub(crate) last_text: String,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server capabilities known so far.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Checks if the server advertised a capability (case-insensitive).
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Text of the most recent completion response.
    #[must_use]
    pub fn last_response_text(&self) -> &str {
        &self.last_text
    }

    /// Sends a CAPABILITY command and updates the stored capabilities.
    pub async fn capability(&mut self) -> Result<Vec<String>> {
        let tag = self.send(&Command::Capability).await?;
        let responses = self.read_until_tagged(&tag).await?;
        self.absorb_capabilities(&responses);
        self.check_tagged_ok(&responses, &tag)?;
        Ok(self.capabilities.clone())
    }

    /// Serializes and writes a command, returning its tag.
    pub(crate) async fn send(&mut self, command: &Command) -> Result<String> {
        let tag = self.tag_gen.next_tag();
        debug!(command = %command.redacted(&tag), "sending");
        self.stream.write_command(&command.serialize(&tag)).await?;
        Ok(tag)
    }

    /// Reads and parses responses until the tagged completion for `tag`.
    pub(crate) async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Response>> {
        let mut responses = Vec::new();
        loop {
            let raw = self.stream.read_response().await?;
            let response = ResponseParser::parse(&raw)?;
            trace!(?response, "received");

            let done = matches!(&response, Response::Tagged { tag: t, .. } if t == tag);
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    /// Checks that the tagged response is OK and remembers its text.
    pub(crate) fn check_tagged_ok(&mut self, responses: &[Response], tag: &str) -> Result<()> {
        for response in responses.iter().rev() {
            if let Response::Tagged {
                tag: resp_tag,
                status,
                text,
                ..
            } = response
                && resp_tag == tag
            {
                self.last_text.clone_from(text);
                return status_result(*status, text);
            }
        }

        Err(Error::Protocol("missing tagged response".to_string()))
    }

    /// Picks up capability data sent alongside a command's responses.
    pub(crate) fn absorb_capabilities(&mut self, responses: &[Response]) {
        for response in responses {
            let caps = match response {
                Response::Untagged(crate::UntaggedResponse::Capability(caps)) => Some(caps.clone()),
                Response::Tagged {
                    code: Some(code), ..
                } => crate::parser::capabilities_from_code(code),
                _ => None,
            };
            if let Some(caps) = caps {
                self.capabilities = caps;
            }
        }
    }

    /// Moves the connection into another state.
    pub(crate) fn transition<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            last_text: self.last_text,
            state,
        }
    }

    /// Gracefully disconnects from the server.
    ///
    /// The server may close the connection right after its BYE, so errors
    /// while reading the completion are ignored.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.send(&Command::Logout).await?;
        if let Err(e) = self.read_until_tagged(&tag).await {
            debug!(error = %e, "connection ended during logout");
        }
        Ok(())
    }
}

/// Maps a completion status to a result.
pub(crate) fn status_result(status: Status, text: &str) -> Result<()> {
    match status {
        Status::Ok | Status::PreAuth => Ok(()),
        Status::No => Err(Error::No(text.to_string())),
        Status::Bad => Err(Error::Bad(text.to_string())),
        Status::Bye => Err(Error::Bye(text.to_string())),
    }
}
