//! Per-message inclusion decisions.
//!
//! Every fetched message goes through two checks, in this order:
//!
//! 1. **Freshness**: messages dated before the run's cutoff are `stale`.
//! 2. **Deduplication**: in a sync run, messages whose `Message-ID` is
//!    already in the [`IdentifierSet`] are `duplicate`.
//!
//! A stale message stops at the first check; it is neither looked up nor
//! recorded. An accepted message's identifier is recorded with
//! [`FilterContext::record`] once its entry is in the archive, in fetch runs
//! too, so the saved set never names a message the archive lacks.

use std::fmt;

use chrono::{DateTime, Days, FixedOffset, Months};
use tracing::{trace, warn};

use crate::envelope::EnvelopeDate;
use crate::error::{Error, Result};
use crate::header;
use crate::idstore::IdentifierSet;

/// Whether a run starts a new archive or extends an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Fresh download; duplicates are not filtered.
    #[default]
    Fetch,
    /// Incremental run against identifiers of earlier runs.
    Sync,
}

/// What to do with a message that has no `Message-ID` when one is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingIdPolicy {
    /// Fail the run with [`Error::MissingMessageId`].
    #[default]
    Abort,
    /// Archive the message without recording it, and warn.
    Skip,
}

/// How far back messages are accepted, relative to the start of the run.
///
/// All-zero offsets disable the freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FreshnessWindow {
    /// Years.
    pub years: u32,
    /// Months.
    pub months: u32,
    /// Days.
    pub days: u32,
}

impl FreshnessWindow {
    /// Creates a window from year, month and day offsets.
    #[must_use]
    pub const fn new(years: u32, months: u32, days: u32) -> Self {
        Self {
            years,
            months,
            days,
        }
    }

    /// Returns true if no freshness check applies.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.years == 0 && self.months == 0 && self.days == 0
    }

    /// The earliest accepted instant for a run starting at `now`.
    ///
    /// Month arithmetic clamps to the end of shorter months
    /// (March 31 minus one month is the last day of February).
    #[must_use]
    pub fn cutoff(&self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        if self.is_disabled() {
            return None;
        }
        let months = self.years.saturating_mul(12).saturating_add(self.months);
        // Out of range: nothing can be older, so there is nothing to check.
        now.checked_sub_months(Months::new(months))
            .and_then(|d| d.checked_sub_days(Days::new(u64::from(self.days))))
    }
}

/// Why a message was left out of the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Older than the freshness cutoff.
    Stale,
    /// Already archived by an earlier run.
    Duplicate,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale => write!(f, "stale"),
            Self::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// Outcome of filtering one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    /// Archive the message. Carries the identifier when one was found.
    Accepted {
        /// The message's `Message-ID`, without angle brackets.
        message_id: Option<String>,
    },
    /// Leave the message out.
    Rejected(RejectReason),
}

impl FilterDecision {
    /// Returns true for [`FilterDecision::Accepted`].
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Filter state of one run.
///
/// Built once before the first message and owned by the worker; it holds
/// the identifier set for the whole run.
#[derive(Debug, Clone)]
pub struct FilterContext {
    cutoff: Option<DateTime<FixedOffset>>,
    mode: RunMode,
    tracking: bool,
    missing_id: MissingIdPolicy,
    ids: IdentifierSet,
}

impl FilterContext {
    /// Creates a context with an empty identifier set and the cutoff of
    /// `window` taken from `now`.
    #[must_use]
    pub fn new(mode: RunMode, window: FreshnessWindow, now: DateTime<FixedOffset>) -> Self {
        Self {
            cutoff: window.cutoff(now),
            mode,
            tracking: false,
            missing_id: MissingIdPolicy::default(),
            ids: IdentifierSet::new(),
        }
    }

    /// Marks the identifier set as one that will be saved.
    #[must_use]
    pub const fn with_tracking(mut self, tracking: bool) -> Self {
        self.tracking = tracking;
        self
    }

    /// Sets the missing `Message-ID` policy.
    #[must_use]
    pub const fn with_missing_id(mut self, policy: MissingIdPolicy) -> Self {
        self.missing_id = policy;
        self
    }

    /// Starts from identifiers of earlier runs.
    #[must_use]
    pub fn with_identifiers(mut self, ids: IdentifierSet) -> Self {
        self.ids = ids;
        self
    }

    /// The freshness cutoff, if enabled.
    #[must_use]
    pub const fn cutoff(&self) -> Option<DateTime<FixedOffset>> {
        self.cutoff
    }

    /// The run mode.
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    /// Identifiers recorded so far.
    #[must_use]
    pub const fn identifiers(&self) -> &IdentifierSet {
        &self.ids
    }

    /// Consumes the context, returning its identifier set.
    #[must_use]
    pub fn into_identifiers(self) -> IdentifierSet {
        self.ids
    }

    /// Identifiers are needed to deduplicate (sync) or to save (tracking).
    const fn requires_identifier(&self) -> bool {
        self.tracking || matches!(self.mode, RunMode::Sync)
    }

    /// Decides whether a message is archived. The identifier of an accepted
    /// message is returned, not recorded.
    ///
    /// # Errors
    ///
    /// [`Error::MissingMessageId`] when the message has no identifier, one is
    /// required, and the policy is [`MissingIdPolicy::Abort`].
    pub fn filter(&mut self, raw: &[u8], date: &EnvelopeDate) -> Result<FilterDecision> {
        if let Some(cutoff) = self.cutoff
            && date.at() < cutoff
        {
            return Ok(FilterDecision::Rejected(RejectReason::Stale));
        }

        let Some(id) = message_id(raw) else {
            if !self.requires_identifier() {
                return Ok(FilterDecision::Accepted { message_id: None });
            }
            return match self.missing_id {
                MissingIdPolicy::Abort => Err(Error::MissingMessageId {
                    preview: header::preview(raw),
                }),
                MissingIdPolicy::Skip => {
                    warn!(headers = %header::preview(raw), "message has no Message-ID, archived untracked");
                    Ok(FilterDecision::Accepted { message_id: None })
                }
            };
        };

        trace!(message_id = %id, "filtering message");
        if self.mode == RunMode::Sync && self.ids.contains(&id) {
            return Ok(FilterDecision::Rejected(RejectReason::Duplicate));
        }

        Ok(FilterDecision::Accepted {
            message_id: Some(id),
        })
    }

    /// Records the identifier of a message whose entry reached the archive.
    pub fn record(&mut self, message_id: String) {
        self.ids.insert(message_id);
    }
}

/// Extracts the `Message-ID` header value without its angle brackets.
#[must_use]
pub fn message_id(raw: &[u8]) -> Option<String> {
    let value = header::find(raw, "Message-ID")?;
    let id = match value.strip_prefix('<') {
        Some(rest) => rest.split_once('>').map_or(rest, |(inner, _)| inner),
        None => value.as_str(),
    };
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}
