//! Type-state markers for IMAP client connection states.
//!
//! `Selected` carries runtime state about the examined mailbox.

use crate::types::MailboxStatus;

/// Marker type for the not-authenticated state.
///
/// In this state, only LOGIN is valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Marker type for the authenticated state.
///
/// In this state, LIST and EXAMINE are valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// State for an examined (read-only selected) mailbox.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: String,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// Creates a new Selected state.
    #[must_use]
    pub fn new(mailbox: impl Into<String>, status: MailboxStatus) -> Self {
        Self {
            mailbox: mailbox.into(),
            status,
        }
    }

    /// Returns the name of the examined mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Returns the mailbox status snapshot from EXAMINE.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_state_markers_are_send_sync() {
        assert_send_sync::<NotAuthenticated>();
        assert_send_sync::<Authenticated>();
        assert_send_sync::<Selected>();
    }

    #[test]
    fn test_selected_state_accessors() {
        let status = MailboxStatus {
            exists: 100,
            recent: 5,
            ..Default::default()
        };
        let selected = Selected::new("INBOX", status);

        assert_eq!(selected.mailbox(), "INBOX");
        assert_eq!(selected.status().exists, 100);
    }
}
