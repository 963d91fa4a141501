//! Integration tests for the IMAP client.
//!
//! These tests script a whole server conversation with `tokio_test`'s mock
//! I/O, so every command the client writes is checked byte for byte.

#![allow(clippy::unwrap_used)]

use mboxmirror_imap::{Client, Error, SequenceSet};
use tokio_test::io::Builder;

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] mock ready\r\n";

#[tokio::test]
async fn test_login_examine_and_stream_messages() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN alice secret\r\n")
        .read(b"A0001 OK [CAPABILITY IMAP4rev1 IDLE] Logged in\r\n")
        .write(b"A0002 EXAMINE INBOX\r\n")
        .read(b"* 2 EXISTS\r\n* 0 RECENT\r\n* OK [UIDVALIDITY 42] ok\r\n")
        .read(b"A0002 OK [READ-ONLY] done\r\n")
        .write(b"A0003 FETCH 1:2 RFC822\r\n")
        .read(b"* 1 FETCH (RFC822 {12}\r\nSubject: a\r\n)\r\n")
        .read(b"* 1 FETCH (FLAGS (\\Seen))\r\n")
        .read(b"* 2 FETCH (RFC822 {12}\r\nSubject: b\r\n)\r\n")
        .read(b"A0003 OK FETCH completed\r\n")
        .write(b"A0004 LOGOUT\r\n")
        .read(b"* BYE see you\r\nA0004 OK bye\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    assert_eq!(client.last_response_text(), "mock ready");
    assert!(client.has_capability("auth=plain"));

    let client = client.login("alice", "secret").await.unwrap();
    assert_eq!(client.last_response_text(), "Logged in");
    assert!(client.has_capability("IDLE"));

    let (mut client, status) = client.examine("INBOX").await.unwrap();
    assert_eq!(status.exists, 2);
    assert_eq!(status.uid_validity, Some(42));
    assert!(status.read_only);
    assert_eq!(client.mailbox(), "INBOX");

    let range = SequenceSet::range(1, status.exists).unwrap();
    let mut fetch = client.fetch_rfc822(&range).await.unwrap();

    let first = fetch.next().await.unwrap().unwrap();
    assert_eq!(first.seq, 1);
    assert_eq!(first.rfc822.unwrap(), b"Subject: a\r\n");

    let second = fetch.next().await.unwrap().unwrap();
    assert_eq!(second.seq, 2);
    assert!(!fetch.is_complete());

    assert!(fetch.next().await.unwrap().is_none());
    assert_eq!(fetch.completion_text(), Some("FETCH completed"));
    assert!(fetch.next().await.unwrap().is_none());

    client.logout().await.unwrap();
}

#[tokio::test]
async fn test_login_rejected() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN bob wrong\r\n")
        .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client.login("bob", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::No(text) if text == "Invalid credentials"));
}

#[tokio::test]
async fn test_bye_greeting() {
    let mock = Builder::new().read(b"* BYE too many connections\r\n").build();

    let err = Client::from_stream(mock).await.unwrap_err();
    assert!(matches!(err, Error::Bye(_)));
}

#[tokio::test]
async fn test_list_mailboxes() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN alice secret\r\n")
        .read(b"A0001 OK Logged in\r\n")
        .write(b"A0002 LIST \"\" *\r\n")
        .read(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\n")
        .read(b"* LIST (\\Noselect \\HasChildren) \"/\" \"[Gmail]\"\r\n")
        .read(b"* LIST (\\HasNoChildren) \"/\" \"[Gmail]/All Mail\"\r\n")
        .read(b"A0002 OK LIST completed\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("alice", "secret").await.unwrap();
    let mailboxes = client.list("", "*").await.unwrap();

    let names: Vec<_> = mailboxes.iter().map(|m| m.mailbox.as_str()).collect();
    assert_eq!(names, vec!["INBOX", "[Gmail]", "[Gmail]/All Mail"]);
    assert!(!mailboxes[1].is_selectable());
}

#[tokio::test]
async fn test_fetch_failure_completion() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN alice secret\r\n")
        .read(b"A0001 OK Logged in\r\n")
        .write(b"A0002 EXAMINE Archive\r\n")
        .read(b"* 1 EXISTS\r\nA0002 OK done\r\n")
        .write(b"A0003 FETCH 1 RFC822\r\n")
        .read(b"A0003 NO message vanished\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("alice", "secret").await.unwrap();
    let (mut client, _) = client.examine("Archive").await.unwrap();

    let range = SequenceSet::range(1, 1).unwrap();
    let mut fetch = client.fetch_rfc822(&range).await.unwrap();
    let err = fetch.next().await.unwrap_err();
    assert!(matches!(err, Error::No(text) if text == "message vanished"));
}
