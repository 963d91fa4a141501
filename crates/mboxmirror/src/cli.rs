//! Command line definition.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use mboxmirror_core::mirror::DEFAULT_REJECTION_VERBOSITY;
use mboxmirror_core::{FreshnessWindow, MirrorOptions, MissingIdPolicy, RunMode};

/// Mirror an IMAP mailbox into an mbox archive.
#[derive(Debug, Parser)]
#[command(name = "mboxmirror", version, about)]
pub struct Cli {
    /// More output; repeat for more detail (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Credentials file: `host[:port]`, user name and password on three lines.
    #[arg(long, global = true, default_value = "auth")]
    pub auth: PathBuf,

    /// Log everything the server sends (trace target `mboxmirror::wire`).
    #[arg(long, global = true)]
    pub dump_protocol: bool,

    /// Directory receiving the `.mbox` archive and `.yaml` identifier file.
    #[arg(long, global = true, default_value = ".")]
    pub output_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// What to do.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the mailboxes of the account.
    List,
    /// Download a mailbox into a new archive.
    Fetch(MirrorArgs),
    /// Append messages not archived yet to an existing archive.
    Sync(MirrorArgs),
}

/// Options shared by `fetch` and `sync`.
#[derive(Debug, Args)]
pub struct MirrorArgs {
    /// Mailbox to mirror.
    #[arg(short, long)]
    pub folder: String,

    /// Save the identifiers of archived messages for later syncs.
    #[arg(short, long)]
    pub trackid: bool,

    /// Only keep messages from within this many years.
    #[arg(long = "wy", default_value_t = 0)]
    pub within_years: u32,

    /// Only keep messages from within this many months.
    #[arg(long = "wm", default_value_t = 0)]
    pub within_months: u32,

    /// Only keep messages from within this many days.
    #[arg(long = "wd", default_value_t = 0)]
    pub within_days: u32,

    /// What to do with a message that has no Message-ID.
    #[arg(long, value_enum, default_value_t = OnMissingId::Abort)]
    pub on_missing_id: OnMissingId,

    /// Verbosity from which skipped messages are reported.
    #[arg(long, default_value_t = DEFAULT_REJECTION_VERBOSITY)]
    pub log_rejections_at: u8,
}

/// Command line spelling of [`MissingIdPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnMissingId {
    /// Stop the run.
    Abort,
    /// Archive the message without tracking it.
    Skip,
}

impl From<OnMissingId> for MissingIdPolicy {
    fn from(value: OnMissingId) -> Self {
        match value {
            OnMissingId::Abort => Self::Abort,
            OnMissingId::Skip => Self::Skip,
        }
    }
}

impl MirrorArgs {
    /// Run settings for this invocation.
    pub fn into_options(self, mode: RunMode, cli_verbosity: u8, output_dir: PathBuf) -> MirrorOptions {
        let mut options = MirrorOptions::new(self.folder, mode);
        options.window = FreshnessWindow::new(self.within_years, self.within_months, self.within_days);
        options.tracking = self.trackid;
        options.missing_id = self.on_missing_id.into();
        options.output_dir = output_dir;
        options.verbosity = cli_verbosity;
        options.log_rejections_at = self.log_rejections_at;
        options
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_arguments() {
        let cli = Cli::try_parse_from([
            "mboxmirror", "-vv", "sync", "-f", "INBOX", "-t", "--wy", "1", "--wd", "3",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.auth, PathBuf::from("auth"));

        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        let options = args.into_options(RunMode::Sync, cli.verbose, cli.output_dir);
        assert_eq!(options.mailbox, "INBOX");
        assert!(options.tracking);
        assert_eq!(options.window, FreshnessWindow::new(1, 0, 3));
        assert_eq!(options.missing_id, MissingIdPolicy::Abort);
        assert_eq!(options.log_rejections_at, 2);
    }

    #[test]
    fn test_global_options_after_verb() {
        let cli = Cli::try_parse_from([
            "mboxmirror",
            "fetch",
            "--folder",
            "Archive",
            "--on-missing-id",
            "skip",
            "--output-dir",
            "/tmp/mail",
            "--dump-protocol",
        ])
        .unwrap();
        assert!(cli.dump_protocol);
        assert_eq!(cli.output_dir, PathBuf::from("/tmp/mail"));

        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.on_missing_id, OnMissingId::Skip);
    }

    #[test]
    fn test_folder_is_required() {
        assert!(Cli::try_parse_from(["mboxmirror", "fetch"]).is_err());
    }
}
