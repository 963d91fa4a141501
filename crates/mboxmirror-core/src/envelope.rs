//! Envelope date resolution.
//!
//! The archive separator line and the freshness filter both need the time a
//! message was sent. It is taken from the `Date:` header, tried against an
//! ordered list of date grammars. A message is never dropped because of its
//! date: when nothing parses, the current time is used.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, Utc};
use regex::Regex;
use tracing::{trace, warn};

use crate::header;

/// Locale-independent `asctime` layout used on separator lines.
pub const ASCTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Date part shared by the RFC 1123 grammars, without weekday and zone.
const RFC1123_BODY: &str = "%d %b %Y %H:%M:%S";

/// Day names accepted before the comma. Only their spelling is checked.
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// A trailing zone comment such as `(PST)` or `(GMT+08:00)`.
#[allow(clippy::unwrap_used)]
static ZONE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([A-Za-z]{2,5}[0-9:+-]*\)\s*$").unwrap());

/// The date grammars tried by [`resolve`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGrammar {
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123,
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Z,
    /// `Mon, 2 Jan 2006 15:04:05 MST`
    LenientDay,
    /// `Mon, 2 Jan 2006 15:04:05 -0700`
    LenientDayZ,
    /// Anything else RFC 2822 allows (no weekday, obsolete zones, ...).
    Rfc2822,
}

impl DateGrammar {
    /// All grammars in the order they are attempted.
    pub const ORDER: [Self; 5] = [
        Self::Rfc1123,
        Self::Rfc1123Z,
        Self::LenientDay,
        Self::LenientDayZ,
        Self::Rfc2822,
    ];

    /// Parses `input` with this grammar.
    ///
    /// A weekday that disagrees with the date is ignored; the date wins.
    #[must_use]
    pub fn parse(self, input: &str) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Rfc1123 => strip_weekday(input)
                .filter(|body| two_digit_day(body))
                .and_then(parse_named_zone),
            Self::Rfc1123Z => strip_weekday(input)
                .filter(|body| two_digit_day(body))
                .and_then(parse_numeric_zone),
            Self::LenientDay => strip_weekday(input).and_then(parse_named_zone),
            Self::LenientDayZ => strip_weekday(input).and_then(parse_numeric_zone),
            Self::Rfc2822 => {
                let input = strip_weekday(input).unwrap_or(input);
                DateTime::parse_from_rfc2822(input).ok()
            }
        }
    }
}

/// Where an [`EnvelopeDate`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// Parsed from the `Date:` header with the given grammar.
    Header(DateGrammar),
    /// The header was missing or unparseable; the resolution time was used.
    Fallback,
}

/// The resolved send time of a message. Always defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeDate {
    at: DateTime<FixedOffset>,
    source: DateSource,
}

impl EnvelopeDate {
    /// Creates an envelope date from a known instant.
    #[must_use]
    pub const fn new(at: DateTime<FixedOffset>, source: DateSource) -> Self {
        Self { at, source }
    }

    /// The current time, used when no header date is available.
    #[must_use]
    pub fn now() -> Self {
        Self::new(Local::now().fixed_offset(), DateSource::Fallback)
    }

    /// The resolved instant, in the zone the message declared.
    #[must_use]
    pub const fn at(&self) -> DateTime<FixedOffset> {
        self.at
    }

    /// How the date was obtained.
    #[must_use]
    pub const fn source(&self) -> DateSource {
        self.source
    }

    /// Returns true if the date is a fallback rather than parsed.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self.source, DateSource::Fallback)
    }
}

impl fmt::Display for EnvelopeDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.at.format(ASCTIME_FORMAT))
    }
}

/// Resolves the envelope date of a raw message.
#[must_use]
pub fn resolve(raw: &[u8]) -> EnvelopeDate {
    let Some(value) = header::find(raw, "Date") else {
        warn!("message has no Date header, using current time");
        return EnvelopeDate::now();
    };

    match parse_date(&value) {
        Some(date) => date,
        None => {
            warn!(date = %value, "unparseable Date header, using current time");
            EnvelopeDate::now()
        }
    }
}

/// Parses a `Date:` header value, trying every grammar in order.
#[must_use]
pub fn parse_date(value: &str) -> Option<EnvelopeDate> {
    let cleaned = ZONE_COMMENT.replace(value.trim(), "");
    let cleaned = cleaned.trim();

    DateGrammar::ORDER.into_iter().find_map(|grammar| {
        let at = grammar.parse(cleaned)?;
        trace!(?grammar, date = cleaned, "parsed envelope date");
        Some(EnvelopeDate::new(at, DateSource::Header(grammar)))
    })
}

/// Removes a leading `Mon, ` and returns the rest.
fn strip_weekday(input: &str) -> Option<&str> {
    let (day, rest) = input.split_once(',')?;
    WEEKDAYS
        .iter()
        .any(|name| name.eq_ignore_ascii_case(day.trim()))
        .then(|| rest.trim_start())
}

/// RFC 1123 proper requires a two-digit day of month.
fn two_digit_day(body: &str) -> bool {
    body.split_ascii_whitespace()
        .next()
        .is_some_and(|day| day.len() == 2)
}

fn parse_numeric_zone(input: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(input, &format!("{RFC1123_BODY} %z")).ok()
}

fn parse_named_zone(input: &str) -> Option<DateTime<FixedOffset>> {
    let (body, zone) = input.rsplit_once(' ')?;
    if zone.is_empty() || !zone.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(body.trim_end(), RFC1123_BODY).ok()?;
    naive.and_local_timezone(zone_offset(zone)).single()
}

/// Offset of a zone abbreviation. Unknown names are taken as UTC.
fn zone_offset(zone: &str) -> FixedOffset {
    let hours = match zone.to_ascii_uppercase().as_str() {
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        "CET" | "BST" => 1,
        "CEST" | "EET" => 2,
        "JST" | "KST" => 9,
        _ => 0,
    };
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}
