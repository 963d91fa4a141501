//! IMAP command builder.
//!
//! Only the commands the mirror issues are modelled.

mod serialize;
mod tag_generator;

use crate::types::{Mailbox, SequenceSet};

pub use tag_generator::TagGenerator;

use serialize::{write_astring, write_mailbox};

/// A message data item requested by FETCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAttribute {
    /// The whole message, headers and body (`RFC822`).
    Rfc822,
    /// Message size in octets.
    Rfc822Size,
    /// Unique identifier.
    Uid,
    /// Message flags.
    Flags,
}

impl FetchAttribute {
    const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Rfc822 => b"RFC822",
            Self::Rfc822Size => b"RFC822.SIZE",
            Self::Uid => b"UID",
            Self::Flags => b"FLAGS",
        }
    }
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY command.
    Capability,
    /// LOGOUT command.
    Logout,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: Mailbox,
    },
    /// FETCH command.
    Fetch {
        /// Messages to fetch.
        sequence: SequenceSet,
        /// Data items to fetch.
        items: Vec<FetchAttribute>,
    },
}

impl Command {
    /// Serializes the command with the given tag, including the trailing CRLF.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }
            Self::List { reference, pattern } => {
                buf.extend_from_slice(b"LIST ");
                write_astring(&mut buf, reference);
                buf.push(b' ');
                // List wildcards must reach the server unquoted.
                if pattern.bytes().all(|b| b == b'*' || b == b'%') && !pattern.is_empty() {
                    buf.extend_from_slice(pattern.as_bytes());
                } else {
                    write_astring(&mut buf, pattern);
                }
            }
            Self::Examine { mailbox } => {
                buf.extend_from_slice(b"EXAMINE ");
                write_mailbox(&mut buf, mailbox);
            }
            Self::Fetch { sequence, items } => {
                buf.extend_from_slice(b"FETCH ");
                buf.extend_from_slice(sequence.to_string().as_bytes());
                buf.push(b' ');
                match items.as_slice() {
                    [single] => buf.extend_from_slice(single.as_bytes()),
                    many => {
                        buf.push(b'(');
                        for (i, item) in many.iter().enumerate() {
                            if i > 0 {
                                buf.push(b' ');
                            }
                            buf.extend_from_slice(item.as_bytes());
                        }
                        buf.push(b')');
                    }
                }
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns a form of the command that is safe to log.
    #[must_use]
    pub fn redacted(&self, tag: &str) -> String {
        match self {
            Self::Login { username, .. } => format!("{tag} LOGIN {username} ****"),
            other => String::from_utf8_lossy(&other.serialize(tag))
                .trim_end()
                .to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_quotes_specials() {
        let cmd = Command::Login {
            username: "user@example.com".into(),
            password: "p a\"ss".into(),
        };
        assert_eq!(
            cmd.serialize("A0001"),
            b"A0001 LOGIN user@example.com \"p a\\\"ss\"\r\n"
        );
    }

    #[test]
    fn test_login_redacted() {
        let cmd = Command::Login {
            username: "me".into(),
            password: "secret".into(),
        };
        let shown = cmd.redacted("A0001");
        assert!(!shown.contains("secret"));
        assert_eq!(shown, "A0001 LOGIN me ****");
    }

    #[test]
    fn test_list_wildcard_unquoted() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".into(),
        };
        assert_eq!(cmd.serialize("A0002"), b"A0002 LIST \"\" *\r\n");
    }

    #[test]
    fn test_examine_quotes_spaces() {
        let cmd = Command::Examine {
            mailbox: Mailbox::new("[Gmail]/All Mail"),
        };
        assert_eq!(
            cmd.serialize("A0003"),
            b"A0003 EXAMINE \"[Gmail]/All Mail\"\r\n"
        );
    }

    #[test]
    fn test_fetch_single_and_multiple_items() {
        let sequence = SequenceSet::range(1, 12).unwrap();
        let single = Command::Fetch {
            sequence,
            items: vec![FetchAttribute::Rfc822],
        };
        assert_eq!(single.serialize("A0004"), b"A0004 FETCH 1:12 RFC822\r\n");

        let many = Command::Fetch {
            sequence,
            items: vec![FetchAttribute::Uid, FetchAttribute::Rfc822],
        };
        assert_eq!(
            many.serialize("A0005"),
            b"A0005 FETCH 1:12 (UID RFC822)\r\n"
        );
    }
}
