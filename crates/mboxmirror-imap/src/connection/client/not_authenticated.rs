//! Implementation for the not-authenticated state.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::parser::{Response, ResponseParser, UntaggedResponse, capabilities_from_code};
use crate::types::Status;
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream.
    ///
    /// Reads the server greeting; its text is available through
    /// [`Client::last_response_text`].
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::greet(FramedStream::new(stream)).await
    }

    /// Like [`Client::from_stream`], bounding every server response by `timeout`.
    pub async fn from_stream_with_timeout(stream: S, timeout: Duration) -> Result<Self> {
        Self::greet(FramedStream::new(stream).with_read_timeout(timeout)).await
    }

    async fn greet(mut framed: FramedStream<S>) -> Result<Self> {
        let greeting = framed.read_response().await?;

        let (code, text) = match ResponseParser::parse(&greeting)? {
            Response::Untagged(UntaggedResponse::Condition {
                status: Status::Bye,
                text,
                ..
            }) => return Err(Error::Bye(text)),
            Response::Untagged(UntaggedResponse::Condition {
                status: Status::Ok | Status::PreAuth,
                code,
                text,
            }) => (code, text),
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected greeting: {other:?}"
                )));
            }
        };
        debug!(greeting = %text, "server greeting");

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities: code
                .as_deref()
                .and_then(capabilities_from_code)
                .unwrap_or_default(),
            last_text: text,
            state: NotAuthenticated,
        })
    }

    /// Authenticates with the server using LOGIN.
    ///
    /// Consumes self and returns an authenticated client on success.
    pub async fn login(mut self, username: &str, password: &str) -> Result<Client<S, Authenticated>> {
        if self.has_capability("LOGINDISABLED") {
            return Err(Error::No("server disabled LOGIN on this connection".to_string()));
        }

        let tag = self
            .send(&Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;

        let responses = self.read_until_tagged(&tag).await?;
        self.absorb_capabilities(&responses);
        self.check_tagged_ok(&responses, &tag)?;

        Ok(self.transition(Authenticated))
    }
}
