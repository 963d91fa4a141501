//! mbox archive entries.
//!
//! Each accepted message is written as
//!
//! ```text
//! From mboxmirror Mon Jan  2 15:04:05 2006\r\n
//! <message bytes, with "\nFrom " escaped to "\n>From ">
//! \r\n
//! ```
//!
//! and entries are only ever appended.

use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;

use regex::bytes::Regex;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::envelope::EnvelopeDate;
use crate::error::Result;

/// Envelope sender written on every separator line.
pub const ENVELOPE_SENDER: &str = "mboxmirror";

#[allow(clippy::unwrap_used)]
static FROM_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\nFrom ").unwrap());

/// Escapes every line that starts with `From ` after a newline.
#[must_use]
pub fn escape_from_lines(raw: &[u8]) -> Cow<'_, [u8]> {
    FROM_LINE.replace_all(raw, &b"\n>From "[..])
}

/// Serializes one archive entry.
#[must_use]
pub fn serialize(raw: &[u8], date: &EnvelopeDate) -> Vec<u8> {
    let separator = format!("From {ENVELOPE_SENDER} {date}\r\n");
    let body = escape_from_lines(raw);

    let mut entry = Vec::with_capacity(separator.len() + body.len() + 2);
    entry.extend_from_slice(separator.as_bytes());
    entry.extend_from_slice(&body);
    entry.extend_from_slice(b"\r\n");
    entry
}

/// How the archive file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Create the file, discarding earlier content.
    Truncate,
    /// Append to the file, creating it if needed.
    Append,
}

/// Appends entries to an archive.
#[derive(Debug)]
pub struct ArchiveWriter<W> {
    inner: W,
    entries: usize,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Opens the archive file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub async fn open(path: &Path, mode: ArchiveMode) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            ArchiveMode::Truncate => options.write(true).truncate(true),
            ArchiveMode::Append => options.append(true),
        };
        let file = options.open(path).await?;

        debug!(path = %path.display(), ?mode, "opened archive");
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: AsyncWrite + Unpin> ArchiveWriter<W> {
    /// Wraps a writer.
    pub const fn new(inner: W) -> Self {
        Self { inner, entries: 0 }
    }

    /// Appends one message.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails.
    pub async fn append(&mut self, raw: &[u8], date: &EnvelopeDate) -> Result<()> {
        self.inner.write_all(&serialize(raw, date)).await?;
        self.entries += 1;
        Ok(())
    }

    /// Number of entries appended through this writer.
    #[must_use]
    pub const fn entries(&self) -> usize {
        self.entries
    }

    /// Flushes buffered entries and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the flush fails.
    pub async fn finish(mut self) -> Result<W> {
        self.inner.flush().await?;
        Ok(self.inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use crate::envelope::{DateSource, EnvelopeDate};

    fn date() -> EnvelopeDate {
        let at = FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2006, 1, 2, 15, 4, 5)
            .unwrap();
        EnvelopeDate::new(at, DateSource::Fallback)
    }

    #[test]
    fn test_entry_layout() {
        let entry = serialize(b"Subject: hi\r\n\r\nbody\r\n", &date());
        assert_eq!(
            entry,
            b"From mboxmirror Mon Jan  2 15:04:05 2006\r\nSubject: hi\r\n\r\nbody\r\n\r\n"
        );
    }

    #[test]
    fn test_from_lines_are_escaped() {
        let raw = b"Subject: x\r\n\r\nhello\r\nFrom evil@example.com\r\nnotFrom x\r\nFromage\r\n";
        let entry = serialize(raw, &date());
        let text = String::from_utf8(entry).unwrap();

        assert!(text.contains("\r\n>From evil@example.com\r\n"));
        assert!(text.contains("\r\nnotFrom x\r\n"));
        assert!(text.contains("\r\nFromage\r\n"));
        assert_eq!(text.matches("\nFrom ").count(), 0);
    }

    #[test]
    fn test_unescaped_content_is_borrowed() {
        assert!(matches!(escape_from_lines(b"plain\r\nbody"), Cow::Borrowed(_)));
    }

    #[tokio::test]
    async fn test_writer_truncate_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INBOX.mbox");
        std::fs::write(&path, b"stale content").unwrap();

        let mut writer = ArchiveWriter::open(&path, ArchiveMode::Truncate).await.unwrap();
        writer.append(b"A: 1\r\n\r\none", &date()).await.unwrap();
        writer.finish().await.unwrap();
        let first = std::fs::read(&path).unwrap();
        assert!(first.starts_with(b"From mboxmirror "));

        let mut writer = ArchiveWriter::open(&path, ArchiveMode::Append).await.unwrap();
        writer.append(b"A: 2\r\n\r\ntwo", &date()).await.unwrap();
        assert_eq!(writer.entries(), 1);
        writer.finish().await.unwrap();

        let both = std::fs::read(&path).unwrap();
        assert!(both.starts_with(&first));
        assert_eq!(both.len(), first.len() * 2);
    }

    proptest! {
        #[test]
        fn prop_escaping_adds_one_byte_per_from_line(body in "(From |x|\r\n|\n| ){0,40}") {
            let raw = body.as_bytes();
            let escaped = escape_from_lines(raw);
            let expected = raw.len() + FROM_LINE.find_iter(raw).count();

            prop_assert_eq!(escaped.len(), expected);
            prop_assert_eq!(FROM_LINE.find_iter(&escaped).count(), 0);
        }
    }
}
