//! Header lookup on raw message bytes.
//!
//! Only the header block (everything before the first empty line) is
//! searched. Folded continuation lines are joined with a single space.

use std::sync::LazyLock;

use regex::bytes::Regex;

/// End of the header block: the first empty line.
#[allow(clippy::unwrap_used)]
static HEADER_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n\r?\n").unwrap());

/// Returns the header block of a raw message.
#[must_use]
pub fn header_block(raw: &[u8]) -> &[u8] {
    HEADER_END
        .find(raw)
        .map_or(raw, |m| &raw[..m.start()])
}

/// Returns the unfolded value of the first header named `name`
/// (case-insensitive), with surrounding whitespace removed.
#[must_use]
pub fn find(raw: &[u8], name: &str) -> Option<String> {
    let block = header_block(raw);
    let mut lines = block.split(|&b| b == b'\n').map(strip_cr).peekable();

    while let Some(line) = lines.next() {
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        if !line[..colon].eq_ignore_ascii_case(name.as_bytes()) {
            continue;
        }

        let mut value = line[colon + 1..].to_vec();
        while let Some(next) = lines.next_if(|l| l.first().is_some_and(|b| *b == b' ' || *b == b'\t')) {
            value.push(b' ');
            value.extend_from_slice(next.trim_ascii_start());
        }
        return Some(String::from_utf8_lossy(value.trim_ascii()).into_owned());
    }

    None
}

/// The first few header lines, for error messages.
#[must_use]
pub fn preview(raw: &[u8]) -> String {
    let block = header_block(raw);
    let lines: Vec<_> = block
        .split(|&b| b == b'\n')
        .map(strip_cr)
        .take(4)
        .map(String::from_utf8_lossy)
        .collect();
    lines.join(" | ")
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = b"Received: by mx\r\n\
        DATE:  Tue, 1 Aug 2017 09:15:00 +0200\r\n\
        Subject: a long\r\n\
        \tfolded subject\r\n\
        \r\n\
        Date: not a header, body text\r\n";

    #[test]
    fn test_find_is_case_insensitive() {
        assert_eq!(
            find(MESSAGE, "Date").as_deref(),
            Some("Tue, 1 Aug 2017 09:15:00 +0200")
        );
    }

    #[test]
    fn test_find_unfolds() {
        assert_eq!(
            find(MESSAGE, "subject").as_deref(),
            Some("a long folded subject")
        );
    }

    #[test]
    fn test_body_is_not_searched() {
        let raw = b"Subject: x\r\n\r\nMessage-ID: <body@example.com>\r\n";
        assert_eq!(find(raw, "Message-ID"), None);
    }

    #[test]
    fn test_headers_without_body() {
        let raw = b"Message-ID: <only@example.com>\r\n";
        assert_eq!(find(raw, "message-id").as_deref(), Some("<only@example.com>"));
    }

    #[test]
    fn test_preview() {
        assert_eq!(
            preview(b"From: a\r\nTo: b\r\n\r\nbody"),
            "From: a | To: b"
        );
    }
}
