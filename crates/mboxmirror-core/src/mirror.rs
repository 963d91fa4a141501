//! The fetch worker: messages in, archive entries out.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Local};
use tokio::fs::File;
use tokio::io::{AsyncWrite, BufWriter};
use tracing::{debug, info, trace, warn};

use crate::archive::{ArchiveMode, ArchiveWriter};
use crate::envelope;
use crate::error::Result;
use crate::filter::{
    FilterContext, FilterDecision, FreshnessWindow, MissingIdPolicy, RejectReason, RunMode,
};
use crate::idstore;
use crate::progress::Reporter;
use crate::source::MessageSource;

/// Verbosity at which rejected messages are reported, unless configured.
pub const DEFAULT_REJECTION_VERBOSITY: u8 = 2;

/// Settings of one mirror run.
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Mailbox to mirror.
    pub mailbox: String,
    /// Fresh fetch or incremental sync.
    pub mode: RunMode,
    /// Freshness window; all zero disables it.
    pub window: FreshnessWindow,
    /// Save the identifier sidecar at the end of the run.
    pub tracking: bool,
    /// Handling of messages without `Message-ID`.
    pub missing_id: MissingIdPolicy,
    /// Directory receiving the archive and sidecar.
    pub output_dir: PathBuf,
    /// Verbosity of the invocation.
    pub verbosity: u8,
    /// Rejections are reported from this verbosity on.
    pub log_rejections_at: u8,
}

impl MirrorOptions {
    /// Options for mirroring `mailbox` into the current directory.
    #[must_use]
    pub fn new(mailbox: impl Into<String>, mode: RunMode) -> Self {
        Self {
            mailbox: mailbox.into(),
            mode,
            window: FreshnessWindow::default(),
            tracking: false,
            missing_id: MissingIdPolicy::default(),
            output_dir: PathBuf::from("."),
            verbosity: 0,
            log_rejections_at: DEFAULT_REJECTION_VERBOSITY,
        }
    }

    /// File name stem for the mailbox; hierarchy separators become `_`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.mailbox.replace(['/', '\\'], "_")
    }

    /// Location of the mbox archive.
    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.mbox", self.file_stem()))
    }

    /// Location of the identifier sidecar.
    #[must_use]
    pub fn sidecar_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.yaml", self.file_stem()))
    }

    /// How the archive is opened for this run.
    #[must_use]
    pub const fn archive_mode(&self) -> ArchiveMode {
        match self.mode {
            RunMode::Fetch => ArchiveMode::Truncate,
            RunMode::Sync => ArchiveMode::Append,
        }
    }

    /// Builds the filter state for a run starting at `now`, loading the
    /// identifiers of earlier runs for a sync.
    ///
    /// # Errors
    ///
    /// Fails in sync mode if the sidecar is missing or corrupt.
    pub async fn filter_context(&self, now: DateTime<FixedOffset>) -> Result<FilterContext> {
        let mut context = FilterContext::new(self.mode, self.window, now)
            .with_tracking(self.tracking)
            .with_missing_id(self.missing_id);
        if self.mode == RunMode::Sync {
            context = context.with_identifiers(idstore::load(&self.sidecar_path()).await?);
        }
        Ok(context)
    }

    const fn reports_rejections(&self) -> bool {
        self.verbosity >= self.log_rejections_at
    }
}

/// Counts of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorSummary {
    /// Messages delivered by the source.
    pub seen: u32,
    /// Messages written to the archive.
    pub archived: u32,
    /// Messages older than the cutoff.
    pub stale: u32,
    /// Messages already archived earlier.
    pub duplicate: u32,
}

impl MirrorSummary {
    fn reject(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::Stale => self.stale += 1,
            RejectReason::Duplicate => self.duplicate += 1,
        }
    }
}

impl fmt::Display for MirrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "complete: {} archived, {} stale, {} duplicate",
            self.archived, self.stale, self.duplicate
        )
    }
}

/// Pulls every message from `source` through date resolution, filtering
/// and serialization.
///
/// # Errors
///
/// Stops at the first source, filter or archive error.
pub async fn mirror_messages<M, W>(
    source: &mut M,
    archive: &mut ArchiveWriter<W>,
    filter: &mut FilterContext,
    reporter: &Reporter,
    options: &MirrorOptions,
) -> Result<MirrorSummary>
where
    M: MessageSource,
    W: AsyncWrite + Unpin,
{
    const PROGRESS: &str = "fetching messages";

    let total = source.total();
    let mut summary = MirrorSummary::default();
    reporter.progress(0, total, PROGRESS).await;

    while let Some(message) = source.next_message().await? {
        let raw = message.as_bytes();
        let date = envelope::resolve(raw);

        match filter.filter(raw, &date)? {
            FilterDecision::Accepted { message_id } => {
                trace!(?message_id, %date, "archiving message");
                archive.append(raw, &date).await?;
                if let Some(id) = message_id {
                    filter.record(id);
                }
                summary.archived += 1;
            }
            FilterDecision::Rejected(reason) => {
                summary.reject(reason);
                if options.reports_rejections() {
                    reporter.status(format!("message ignored: {reason}")).await;
                } else {
                    debug!(%reason, "message ignored");
                }
            }
        }

        summary.seen += 1;
        reporter.progress(summary.seen, total, PROGRESS).await;
    }

    Ok(summary)
}

/// One mirror run, from filter set-up to sidecar save.
///
/// Preparing the run loads the identifiers of earlier runs, so a missing
/// sidecar is reported before any connection is made or any archive is
/// touched.
#[derive(Debug)]
pub struct MirrorRun<'a> {
    options: &'a MirrorOptions,
    filter: FilterContext,
}

impl<'a> MirrorRun<'a> {
    /// Builds the filter state of a run starting now.
    ///
    /// # Errors
    ///
    /// Fails in sync mode if the sidecar is missing or corrupt.
    pub async fn prepare(options: &'a MirrorOptions) -> Result<Self> {
        let filter = options.filter_context(Local::now().fixed_offset()).await?;
        if let Some(cutoff) = filter.cutoff() {
            info!(%cutoff, "skipping messages older than cutoff");
        }
        Ok(Self { options, filter })
    }

    /// The filter state.
    #[must_use]
    pub const fn filter(&self) -> &FilterContext {
        &self.filter
    }

    /// Opens the archive file of this run.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub async fn open_archive(&self) -> Result<ArchiveWriter<BufWriter<File>>> {
        ArchiveWriter::open(&self.options.archive_path(), self.options.archive_mode()).await
    }

    /// Mirrors `source` into `archive`, then saves the sidecar if tracking.
    ///
    /// The sidecar is written even when the run fails part-way, so it
    /// covers every entry that reached the archive. It is not written when
    /// the archive could not be flushed: buffered entries may be lost, and
    /// the sidecar of the previous run stays in place.
    ///
    /// # Errors
    ///
    /// Returns the first error of the run; archive and sidecar failures are
    /// fatal.
    pub async fn execute<M, W>(
        mut self,
        source: &mut M,
        mut archive: ArchiveWriter<W>,
        reporter: &Reporter,
    ) -> Result<MirrorSummary>
    where
        M: MessageSource,
        W: AsyncWrite + Unpin,
    {
        let outcome =
            mirror_messages(source, &mut archive, &mut self.filter, reporter, self.options).await;
        let flushed = archive.finish().await.map(drop);
        let saved = if !self.options.tracking {
            Ok(())
        } else if let Err(err) = &flushed {
            warn!(error = %err, "archive not flushed, identifier file left unchanged");
            Ok(())
        } else {
            idstore::save(self.filter.identifiers(), &self.options.sidecar_path()).await
        };

        let summary = outcome?;
        flushed?;
        saved?;

        info!(
            mailbox = %self.options.mailbox,
            archived = summary.archived,
            stale = summary.stale,
            duplicate = summary.duplicate,
            "mirror complete"
        );
        reporter.status(summary.to_string()).await;
        Ok(summary)
    }
}

/// Mirrors `source` into the archive and sidecar named by `options`.
///
/// # Errors
///
/// See [`MirrorRun::prepare`], [`MirrorRun::open_archive`] and
/// [`MirrorRun::execute`].
pub async fn run_mirror<M: MessageSource>(
    source: &mut M,
    options: &MirrorOptions,
    reporter: &Reporter,
) -> Result<MirrorSummary> {
    let run = MirrorRun::prepare(options).await?;
    let archive = run.open_archive().await?;
    run.execute(source, archive, reporter).await
}
