//! Core IMAP types used by the client.

use std::fmt;

/// Mailbox name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a new mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the mailbox name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mailbox status information gathered from an EXAMINE response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// UIDVALIDITY value, if announced.
    pub uid_validity: Option<u32>,
    /// Next UID to be assigned, if announced.
    pub uid_next: Option<u32>,
    /// Whether the server opened the mailbox read-only.
    pub read_only: bool,
}

impl fmt::Display for MailboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} messages, {} recent", self.exists, self.recent)?;
        if let Some(validity) = self.uid_validity {
            write!(f, ", uidvalidity {validity}")?;
        }
        if let Some(next) = self.uid_next {
            write!(f, ", uidnext {next}")?;
        }
        if self.read_only {
            f.write_str(", read-only")?;
        }
        Ok(())
    }
}

/// LIST response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Raw mailbox attributes (e.g. `\HasNoChildren`).
    pub attributes: Vec<String>,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub mailbox: Mailbox,
}

impl ListResponse {
    /// Returns true if the mailbox carries the `\Noselect` attribute.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case("\\Noselect"))
    }
}

/// Status of a tagged or untagged condition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed.
    No,
    /// Command was malformed.
    Bad,
    /// Connection is pre-authenticated.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    /// Parses a status keyword (case-insensitive).
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

/// A contiguous range of message sequence numbers, `start:end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceSet {
    start: u32,
    end: u32,
}

impl SequenceSet {
    /// Creates a range. Returns `None` for an empty or zero-based range,
    /// since sequence numbers start at 1.
    #[must_use]
    pub const fn range(start: u32, end: u32) -> Option<Self> {
        if start == 0 || end < start {
            None
        } else {
            Some(Self { start, end })
        }
    }

    /// Number of messages covered by the range.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Always false; an empty range cannot be constructed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_range() {
        assert!(SequenceSet::range(0, 5).is_none());
        assert!(SequenceSet::range(5, 4).is_none());

        let set = SequenceSet::range(1, 42).unwrap();
        assert_eq!(set.to_string(), "1:42");
        assert_eq!(set.len(), 42);

        let single = SequenceSet::range(7, 7).unwrap();
        assert_eq!(single.to_string(), "7");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(Status::parse("ok"), Some(Status::Ok));
        assert_eq!(Status::parse("BYE"), Some(Status::Bye));
        assert_eq!(Status::parse("FETCH"), None);
    }

    #[test]
    fn test_list_selectable() {
        let list = ListResponse {
            attributes: vec!["\\NoSelect".into()],
            delimiter: Some('/'),
            mailbox: Mailbox::new("[Gmail]"),
        };
        assert!(!list.is_selectable());
    }

    #[test]
    fn test_mailbox_status_display() {
        let status = MailboxStatus {
            exists: 3,
            recent: 1,
            uid_validity: Some(9),
            uid_next: None,
            read_only: true,
        };
        assert_eq!(
            status.to_string(),
            "3 messages, 1 recent, uidvalidity 9, read-only"
        );
    }
}
