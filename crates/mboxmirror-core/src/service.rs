//! IMAP-backed operations of the worker.
//!
//! These glue the IMAP client, the stream instrumentation and the progress
//! bus together; everything that decides what ends up in the archive lives
//! in [`crate::mirror`].

use mboxmirror_imap::connection::connect_tls;
use mboxmirror_imap::{Authenticated, Client, FetchStream, ListResponse, Selected, SequenceSet};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::account::Account;
use crate::error::Result;
use crate::instrument::{BoxedStream, Instrumentation};
use crate::mirror::{MirrorOptions, MirrorRun, MirrorSummary};
use crate::progress::Reporter;
use crate::source::{MessageSource, RawMessage};

/// An authenticated connection running over the instrumented stream.
pub type AuthClient = Client<BoxedStream, Authenticated>;

/// Connects to the account's server over TLS and logs in, reporting each
/// step.
///
/// # Errors
///
/// Returns an error if the connection, greeting or login fails.
pub async fn connect_and_login(
    account: &Account,
    instrumentation: &Instrumentation,
    reporter: &Reporter,
) -> Result<AuthClient> {
    let config = account.imap_config();

    reporter.status("connecting...").await;
    let stream = connect_tls(&config).await?;
    let client = Client::from_stream_with_timeout(instrumentation.wrap(stream), config.io_timeout)
        .await?;
    // The boxed stream is not Sync: no borrow of the client across an await.
    let hello = format!("server hello: {}", client.last_response_text());
    reporter.status(hello).await;

    reporter.status("logging in...").await;
    let mut client = client.login(&account.username, &account.password).await?;
    let completion = client.last_response_text().to_string();
    reporter.status(completion).await;

    if client.capabilities().is_empty() {
        client.capability().await?;
    }
    let capabilities = format!("server capabilities: {}", client.capabilities().join(" "));
    reporter.status(capabilities).await;

    info!(server = %config.address(), user = %account.username, "logged in");
    Ok(client)
}

/// Lists every mailbox on the server.
///
/// # Errors
///
/// Returns an error if the LIST command fails.
pub async fn list_mailboxes<S>(client: &mut Client<S, Authenticated>) -> Result<Vec<ListResponse>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Ok(client.list("", "*").await?)
}

/// Connects, lists mailboxes and reports them one per line.
///
/// # Errors
///
/// Returns an error if any IMAP step fails.
pub async fn list_account(
    account: &Account,
    instrumentation: &Instrumentation,
    reporter: &Reporter,
) -> Result<()> {
    let mut client = connect_and_login(account, instrumentation, reporter).await?;
    let mailboxes = list_mailboxes(&mut client).await?;

    reporter.status("Available mailboxes:").await;
    for mailbox in &mailboxes {
        reporter.status(mailbox_line(mailbox)).await;
    }

    client.logout().await?;
    Ok(())
}

fn mailbox_line(mailbox: &ListResponse) -> String {
    format!("  {}", mailbox.mailbox)
}

/// Messages of an examined mailbox, streamed by a single FETCH.
pub struct ImapSource<'a, S> {
    fetch: Option<FetchStream<'a, S>>,
    total: u32,
}

impl<'a, S> ImapSource<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Fetches `1:exists` of the examined mailbox. An empty mailbox issues
    /// no command at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the FETCH command cannot be sent.
    pub async fn fetch_all(
        client: &'a mut Client<S, Selected>,
        reporter: &Reporter,
    ) -> Result<Self> {
        let total = client.mailbox_status().exists;
        let Some(range) = SequenceSet::range(1, total) else {
            debug!(mailbox = client.mailbox(), "mailbox is empty");
            return Ok(Self { fetch: None, total });
        };

        reporter.status(format!("requesting messages {range}")).await;
        let fetch = client.fetch_rfc822(&range).await?;
        Ok(Self {
            fetch: Some(fetch),
            total,
        })
    }
}

impl<S> MessageSource for ImapSource<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn total(&self) -> u32 {
        self.total
    }

    async fn next_message(&mut self) -> Result<Option<RawMessage>> {
        let Some(fetch) = self.fetch.as_mut() else {
            return Ok(None);
        };
        while let Some(message) = fetch.next().await? {
            if let Some(body) = message.rfc822 {
                return Ok(Some(RawMessage::new(body)));
            }
        }
        if let Some(text) = fetch.completion_text() {
            debug!(completion = text, "fetch complete");
        }
        Ok(None)
    }
}

/// Mirrors one mailbox of the account.
///
/// # Errors
///
/// Returns the first IMAP, archive or sidecar error.
pub async fn mirror_mailbox(
    account: &Account,
    instrumentation: &Instrumentation,
    options: &MirrorOptions,
    reporter: &Reporter,
) -> Result<MirrorSummary> {
    let run = MirrorRun::prepare(options).await?;

    let client = connect_and_login(account, instrumentation, reporter).await?;
    reporter.status(format!("opening {}...", options.mailbox)).await;
    let (mut client, status) = client.examine(&options.mailbox).await?;
    reporter.status(format!("mailbox status: {status}")).await;

    let archive = run.open_archive().await?;
    let summary = {
        let mut source = ImapSource::fetch_all(&mut client, reporter).await?;
        run.execute(&mut source, archive, reporter).await?
    };

    client.logout().await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use mboxmirror_imap::Mailbox;

    use super::*;

    #[test]
    fn test_mailbox_line_indent() {
        let mailbox = ListResponse {
            attributes: vec!["\\HasNoChildren".to_string()],
            delimiter: Some('/'),
            mailbox: Mailbox::new("Archive/2024"),
        };
        assert_eq!(mailbox_line(&mailbox), "  Archive/2024");
    }
}
