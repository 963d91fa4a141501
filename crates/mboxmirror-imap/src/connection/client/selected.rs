//! Implementation for the selected state and streaming FETCH.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::states::Selected;
use super::{Client, status_result};
use crate::command::{Command, FetchAttribute};
use crate::parser::{FetchedMessage, Response, ResponseParser, UntaggedResponse};
use crate::types::{MailboxStatus, SequenceSet};
use crate::{Error, Result};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the examined mailbox name.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Returns the status snapshot taken when the mailbox was examined.
    #[must_use]
    pub const fn mailbox_status(&self) -> &MailboxStatus {
        self.state.status()
    }

    /// Starts `FETCH <sequence> RFC822` and returns a stream yielding one
    /// message per FETCH response, in server order.
    pub async fn fetch_rfc822(&mut self, sequence: &SequenceSet) -> Result<FetchStream<'_, S>> {
        let tag = self
            .send(&Command::Fetch {
                sequence: *sequence,
                items: vec![FetchAttribute::Rfc822],
            })
            .await?;

        Ok(FetchStream {
            client: self,
            tag,
            finished: false,
        })
    }
}

/// Messages of an in-flight FETCH, read one response at a time.
///
/// The stream ends (`Ok(None)`) on the command's tagged OK; a NO or BAD
/// completion ends it with an error.
pub struct FetchStream<'a, S> {
    client: &'a mut Client<S, Selected>,
    tag: String,
    finished: bool,
}

impl<S> FetchStream<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Waits for the next fetched message.
    pub async fn next(&mut self) -> Result<Option<FetchedMessage>> {
        while !self.finished {
            let raw = self.client.stream.read_response().await?;

            match ResponseParser::parse(&raw)? {
                Response::Untagged(UntaggedResponse::Fetch { seq, items }) => {
                    let message = FetchedMessage::from_items(seq, items);
                    if message.rfc822.is_some() {
                        return Ok(Some(message));
                    }
                    // Flag updates and the like arrive as FETCH too.
                    debug!(seq, "fetch response without message body");
                }
                Response::Untagged(UntaggedResponse::Condition {
                    status: crate::Status::Bye,
                    text,
                    ..
                }) => {
                    self.finished = true;
                    return Err(Error::Bye(text));
                }
                Response::Tagged {
                    tag, status, text, ..
                } if tag == self.tag => {
                    self.finished = true;
                    status_result(status, &text)?;
                    self.client.last_text = text;
                }
                unsolicited => debug!(?unsolicited, "unsolicited response during fetch"),
            }
        }
        Ok(None)
    }

    /// Returns true once the tagged completion has been read.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.finished
    }

    /// Text of the tagged completion, available once the stream is complete.
    #[must_use]
    pub fn completion_text(&self) -> Option<&str> {
        self.finished.then_some(self.client.last_text.as_str())
    }
}
