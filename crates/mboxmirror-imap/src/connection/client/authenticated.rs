//! Implementation for the authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::Result;
use crate::command::Command;
use crate::parser::{Response, UntaggedResponse};
use crate::types::{ListResponse, Mailbox, MailboxStatus};

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Examines a mailbox for read-only access.
    ///
    /// Consumes self and returns a selected client on success.
    pub async fn examine(mut self, mailbox: &str) -> Result<(Client<S, Selected>, MailboxStatus)> {
        let tag = self
            .send(&Command::Examine {
                mailbox: Mailbox::new(mailbox),
            })
            .await?;

        let responses = self.read_until_tagged(&tag).await?;
        let status = parse_mailbox_status(&responses);
        self.check_tagged_ok(&responses, &tag)?;

        let client = self.transition(Selected::new(mailbox, status.clone()));
        Ok((client, status))
    }

    /// Lists mailboxes matching a pattern.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let tag = self
            .send(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;

        let responses = self.read_until_tagged(&tag).await?;
        self.check_tagged_ok(&responses, &tag)?;

        Ok(responses
            .into_iter()
            .filter_map(|response| match response {
                Response::Untagged(UntaggedResponse::List(item)) => Some(item),
                _ => None,
            })
            .collect())
    }
}

/// Collects the mailbox status from EXAMINE responses.
fn parse_mailbox_status(responses: &[Response]) -> MailboxStatus {
    let mut status = MailboxStatus::default();

    for response in responses {
        match response {
            Response::Untagged(UntaggedResponse::Exists(n)) => status.exists = *n,
            Response::Untagged(UntaggedResponse::Recent(n)) => status.recent = *n,
            Response::Untagged(UntaggedResponse::Condition {
                code: Some(code), ..
            })
            | Response::Tagged {
                code: Some(code), ..
            } => apply_response_code(&mut status, code),
            _ => {}
        }
    }

    status
}

fn apply_response_code(status: &mut MailboxStatus, code: &str) {
    let (keyword, value) = code.split_once(' ').unwrap_or((code, ""));
    match keyword.to_ascii_uppercase().as_str() {
        "UIDVALIDITY" => status.uid_validity = value.trim().parse().ok(),
        "UIDNEXT" => status.uid_next = value.trim().parse().ok(),
        "READ-ONLY" => status.read_only = true,
        _ => {}
    }
}
