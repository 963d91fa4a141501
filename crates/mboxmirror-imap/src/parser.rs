//! Sans-I/O parser for the IMAP responses the client consumes.
//!
//! Input is one complete response as assembled by
//! [`FramedStream`](crate::FramedStream): the response line plus any literal
//! data embedded in it.
//!
//! # Example
//!
//! ```
//! use mboxmirror_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* 12 EXISTS\r\n").unwrap();
//! assert_eq!(response, Response::Untagged(UntaggedResponse::Exists(12)));
//! ```

#![allow(clippy::missing_errors_doc)]

use crate::types::{ListResponse, Mailbox, Status};
use crate::{Error, Result};

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged {
        /// The command tag.
        tag: String,
        /// Response status.
        status: Status,
        /// Optional bracketed response code, without the brackets.
        code: Option<String>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Text following the `+`.
        text: String,
    },
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `OK`, `NO`, `BAD`, `PREAUTH` or `BYE`.
    Condition {
        /// Condition status.
        status: Status,
        /// Optional bracketed response code, without the brackets.
        code: Option<String>,
        /// Human-readable text.
        text: String,
    },
    /// Capability listing.
    Capability(Vec<String>),
    /// LIST data.
    List(ListResponse),
    /// Number of messages in the mailbox.
    Exists(u32),
    /// Number of recent messages.
    Recent(u32),
    /// A message was expunged.
    Expunge(u32),
    /// FETCH data for one message.
    Fetch {
        /// Message sequence number.
        seq: u32,
        /// Data items.
        items: Vec<FetchItem>,
    },
    /// Anything the client does not interpret (FLAGS, NAMESPACE, ...).
    Other(String),
}

/// One FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// Whole message bytes (`RFC822` or `BODY[]`).
    Rfc822(Vec<u8>),
    /// Unique identifier.
    Uid(u32),
    /// Message size in octets.
    Rfc822Size(u32),
    /// Message flags.
    Flags(Vec<String>),
}

/// A message delivered by a streaming fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Sequence number.
    pub seq: u32,
    /// UID, if fetched.
    pub uid: Option<u32>,
    /// Whole message bytes, if fetched.
    pub rfc822: Option<Vec<u8>>,
}

impl FetchedMessage {
    /// Builds a message from FETCH data items.
    #[must_use]
    pub fn from_items(seq: u32, items: Vec<FetchItem>) -> Self {
        let mut message = Self {
            seq,
            uid: None,
            rfc822: None,
        };
        for item in items {
            match item {
                FetchItem::Rfc822(data) => message.rfc822 = Some(data),
                FetchItem::Uid(uid) => message.uid = Some(uid),
                FetchItem::Rfc822Size(_) | FetchItem::Flags(_) => {}
            }
        }
        message
    }
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one complete response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut cursor = Cursor::new(input);

        match cursor.peek() {
            Some(b'*') => {
                cursor.bump();
                cursor.expect(b' ')?;
                Self::parse_untagged(&mut cursor).map(Response::Untagged)
            }
            Some(b'+') => {
                cursor.bump();
                cursor.skip_spaces();
                Ok(Response::Continuation {
                    text: cursor.rest(),
                })
            }
            Some(_) => Self::parse_tagged(&mut cursor),
            None => Err(cursor.error("empty response")),
        }
    }

    fn parse_tagged(cursor: &mut Cursor<'_>) -> Result<Response> {
        let tag = cursor.word();
        if tag.is_empty() {
            return Err(cursor.error("expected tag"));
        }
        cursor.expect(b' ')?;
        let keyword = cursor.word();
        let status = Status::parse(&keyword)
            .ok_or_else(|| cursor.error(format!("unknown status {keyword:?}")))?;
        cursor.skip_spaces();
        let (code, text) = cursor.resp_text();

        Ok(Response::Tagged {
            tag,
            status,
            code,
            text,
        })
    }

    fn parse_untagged(cursor: &mut Cursor<'_>) -> Result<UntaggedResponse> {
        if cursor.peek().is_some_and(|b| b.is_ascii_digit()) {
            let number = cursor.number()?;
            cursor.expect(b' ')?;
            let keyword = cursor.word().to_ascii_uppercase();
            return match keyword.as_str() {
                "EXISTS" => Ok(UntaggedResponse::Exists(number)),
                "RECENT" => Ok(UntaggedResponse::Recent(number)),
                "EXPUNGE" => Ok(UntaggedResponse::Expunge(number)),
                "FETCH" => {
                    cursor.expect(b' ')?;
                    let items = Self::parse_fetch_items(cursor)?;
                    Ok(UntaggedResponse::Fetch { seq: number, items })
                }
                _ => Ok(UntaggedResponse::Other(format!(
                    "{number} {keyword} {}",
                    cursor.rest()
                ))),
            };
        }

        let keyword = cursor.word();
        if let Some(status) = Status::parse(&keyword) {
            cursor.skip_spaces();
            let (code, text) = cursor.resp_text();
            return Ok(UntaggedResponse::Condition { status, code, text });
        }

        match keyword.to_ascii_uppercase().as_str() {
            "CAPABILITY" => {
                cursor.skip_spaces();
                Ok(UntaggedResponse::Capability(split_words(&cursor.rest())))
            }
            "LIST" | "LSUB" => {
                cursor.expect(b' ')?;
                Self::parse_list(cursor).map(UntaggedResponse::List)
            }
            _ => {
                cursor.skip_spaces();
                Ok(UntaggedResponse::Other(format!(
                    "{keyword} {}",
                    cursor.rest()
                )))
            }
        }
    }

    fn parse_list(cursor: &mut Cursor<'_>) -> Result<ListResponse> {
        let attributes = cursor.atom_list()?;
        cursor.expect(b' ')?;
        let delimiter = cursor
            .nstring()?
            .and_then(|d| d.first().copied())
            .map(char::from);
        cursor.expect(b' ')?;
        let name = cursor.astring()?;

        Ok(ListResponse {
            attributes,
            delimiter,
            mailbox: Mailbox::new(String::from_utf8_lossy(&name)),
        })
    }

    fn parse_fetch_items(cursor: &mut Cursor<'_>) -> Result<Vec<FetchItem>> {
        cursor.expect(b'(')?;
        let mut items = Vec::new();

        loop {
            cursor.skip_spaces();
            match cursor.peek() {
                Some(b')') => {
                    cursor.bump();
                    break;
                }
                None => return Err(cursor.error("unterminated FETCH data")),
                Some(_) => {}
            }

            let name = cursor.word().to_ascii_uppercase();
            cursor.expect(b' ')?;

            match name.as_str() {
                "RFC822" | "BODY[]" => {
                    if let Some(data) = cursor.nstring()? {
                        items.push(FetchItem::Rfc822(data));
                    }
                }
                "UID" => items.push(FetchItem::Uid(cursor.number()?)),
                "RFC822.SIZE" => items.push(FetchItem::Rfc822Size(cursor.number()?)),
                "FLAGS" => items.push(FetchItem::Flags(cursor.atom_list()?)),
                _ => cursor.skip_value()?,
            }
        }

        Ok(items)
    }
}

/// Extracts the capability names from a `CAPABILITY ...` response code.
#[must_use]
pub fn capabilities_from_code(code: &str) -> Option<Vec<String>> {
    let (keyword, rest) = code.split_once(' ').unwrap_or((code, ""));
    keyword
        .eq_ignore_ascii_case("CAPABILITY")
        .then(|| split_words(rest))
}

fn split_words(text: &str) -> Vec<String> {
    text.split_ascii_whitespace().map(str::to_string).collect()
}

/// Byte cursor over one response.
struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    const fn bump(&mut self) {
        self.pos += 1;
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}", char::from(byte))))
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.bump();
        }
    }

    /// Reads an atom. Brackets are kept together so that section
    /// specifiers such as `BODY[HEADER.FIELDS (DATE)]` stay one token.
    fn atom(&mut self) -> &'a [u8] {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b' ' | b'(' | b')' if depth == 0 => break,
                b'\r' | b'\n' => break,
                _ => {}
            }
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn word(&mut self) -> String {
        String::from_utf8_lossy(self.atom()).into_owned()
    }

    fn number(&mut self) -> Result<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("expected number"))
    }

    fn quoted(&mut self) -> Result<Vec<u8>> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\r' | b'\n') => return Err(self.error("unterminated quoted string")),
                Some(b'"') => {
                    self.bump();
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.bump();
                    if let Some(escaped) = self.peek() {
                        out.push(escaped);
                        self.bump();
                    }
                }
                Some(b) => {
                    out.push(b);
                    self.bump();
                }
            }
        }
    }

    fn literal(&mut self) -> Result<Vec<u8>> {
        self.expect(b'{')?;
        let len = self.number()? as usize;
        if self.peek() == Some(b'+') {
            self.bump();
        }
        self.expect(b'}')?;
        self.expect(b'\r')?;
        self.expect(b'\n')?;

        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("literal runs past end of response"))?;
        let data = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(data)
    }

    /// Reads a quoted string, a literal or `NIL`.
    fn nstring(&mut self) -> Result<Option<Vec<u8>>> {
        match self.peek() {
            Some(b'"') => self.quoted().map(Some),
            Some(b'{') => self.literal().map(Some),
            _ => {
                if self.atom().eq_ignore_ascii_case(b"NIL") {
                    Ok(None)
                } else {
                    Err(self.error("expected string or NIL"))
                }
            }
        }
    }

    /// Reads a quoted string, a literal or a bare atom.
    fn astring(&mut self) -> Result<Vec<u8>> {
        match self.peek() {
            Some(b'"') => self.quoted(),
            Some(b'{') => self.literal(),
            _ => {
                let atom = self.atom();
                if atom.is_empty() {
                    Err(self.error("expected astring"))
                } else {
                    Ok(atom.to_vec())
                }
            }
        }
    }

    /// Reads a parenthesized list of atoms such as a flag list.
    fn atom_list(&mut self) -> Result<Vec<String>> {
        self.expect(b'(')?;
        let mut atoms = Vec::new();
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(b')') => {
                    self.bump();
                    return Ok(atoms);
                }
                None | Some(b'\r' | b'\n') => return Err(self.error("unterminated list")),
                Some(_) => {
                    let atom = self.word();
                    if atom.is_empty() {
                        return Err(self.error("expected atom"));
                    }
                    atoms.push(atom);
                }
            }
        }
    }

    /// Skips one value of any shape.
    fn skip_value(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'(') => {
                self.bump();
                loop {
                    self.skip_spaces();
                    match self.peek() {
                        Some(b')') => {
                            self.bump();
                            return Ok(());
                        }
                        None => return Err(self.error("unterminated list")),
                        Some(_) => self.skip_value()?,
                    }
                }
            }
            Some(b'"') => self.quoted().map(drop),
            Some(b'{') => self.literal().map(drop),
            _ => {
                if self.atom().is_empty() {
                    Err(self.error("expected value"))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Reads `[code] text` up to the end of the line.
    fn resp_text(&mut self) -> (Option<String>, String) {
        let mut code = None;
        if self.peek() == Some(b'[') {
            let rest = &self.input[self.pos..];
            if let Some(close) = rest.iter().position(|&b| b == b']') {
                code = Some(String::from_utf8_lossy(&rest[1..close]).into_owned());
                self.pos += close + 1;
                self.skip_spaces();
            }
        }
        (code, self.rest())
    }

    fn rest(&mut self) -> String {
        let start = self.pos;
        while !matches!(self.peek(), None | Some(b'\r' | b'\n')) {
            self.bump();
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }
}
