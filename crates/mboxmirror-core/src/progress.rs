//! Status and progress reporting between the worker and the terminal.
//!
//! The worker runs as its own task and reports through a [`Reporter`]; the
//! invoking task drains the events with a [`Renderer`]. The worker is
//! supervised: whether it returns an error or panics, the renderer receives
//! exactly one [`ProgressEvent::Failure`] as the last event, then the channel
//! closes. The render loop therefore always reaches a terminal state.
//!
//! ```text
//! worker ──Reporter──→ mpsc(1) ──→ Renderer::run ──→ terminal
//!    │                    ↑
//!    └── JoinHandle ── supervisor (Err / panic → Failure)
//! ```

use std::any::Any;
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use crate::error::{Error, Result};
use crate::instrument::BandwidthMonitor;

/// Capacity of the event channel. Minimal, so the worker never runs far
/// ahead of what is on screen.
pub const EVENT_BUFFER: usize = 1;

/// Bandwidth sampling period of the render loop.
pub const TICK: Duration = Duration::from_secs(1);

/// Erases the rest of the current terminal line after a carriage return.
const OVERPRINT: &str = "\r\x1B[K";

/// One message from the worker to the renderer.
#[derive(Debug)]
pub enum ProgressEvent {
    /// A line of plain status text.
    Status(String),
    /// A step of a counted operation; consecutive progress lines overprint.
    Progress {
        /// Steps done.
        current: u32,
        /// Steps expected.
        total: u32,
        /// What is being counted.
        text: String,
    },
    /// The worker failed. Always the last event.
    Failure(Error),
}

/// The worker's end of the event channel.
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: mpsc::Sender<ProgressEvent>,
}

impl Reporter {
    /// Reports a status line.
    pub async fn status(&self, text: impl Into<String>) {
        self.send(ProgressEvent::Status(text.into())).await;
    }

    /// Reports progress of a counted operation.
    pub async fn progress(&self, current: u32, total: u32, text: impl Into<String>) {
        self.send(ProgressEvent::Progress {
            current,
            total,
            text: text.into(),
        })
        .await;
    }

    async fn send(&self, event: ProgressEvent) {
        // A closed channel means nobody is watching; the work goes on.
        if self.tx.send(event).await.is_err() {
            debug!("progress receiver is gone");
        }
    }
}

/// Spawns `work` on its own task and returns the supervisor handle together
/// with the receiving end of its events.
///
/// The supervisor converts an error result or a panic of the worker into a
/// final [`ProgressEvent::Failure`].
pub fn spawn_worker<F, Fut>(work: F) -> (JoinHandle<()>, mpsc::Receiver<ProgressEvent>)
where
    F: FnOnce(Reporter) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let worker = tokio::spawn(work(Reporter { tx: tx.clone() }));

    let supervisor = tokio::spawn(async move {
        let failure = match worker.await {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(join) => Error::WorkerPanicked(panic_message(join)),
        };
        debug!(error = %failure, "worker failed");
        // Sent after the worker is gone, so nothing can follow it.
        let _ = tx.send(ProgressEvent::Failure(failure)).await;
    });

    (supervisor, rx)
}

fn panic_message(join: JoinError) -> String {
    match join.try_into_panic() {
        Ok(payload) => payload_text(payload.as_ref()),
        Err(join) => join.to_string(),
    }
}

fn payload_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// How the render loop ended.
#[derive(Debug)]
pub enum RenderOutcome {
    /// The worker finished and closed the channel.
    Done,
    /// The worker failed; its error was the last line rendered.
    Failed(Error),
}

impl RenderOutcome {
    /// Returns true for [`RenderOutcome::Done`].
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Draws progress events on a terminal.
#[derive(Debug)]
pub struct Renderer<W> {
    out: W,
    monitor: Option<Arc<BandwidthMonitor>>,
    line: String,
    overprint: bool,
    started: bool,
}

impl<W: Write> Renderer<W> {
    /// Creates a renderer writing to `out`.
    pub const fn new(out: W) -> Self {
        Self {
            out,
            monitor: None,
            line: String::new(),
            overprint: false,
            started: false,
        }
    }

    /// Shows throughput of `monitor` after progress lines.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<BandwidthMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Renders events until the channel closes or a failure arrives.
    ///
    /// The receiver is consumed: once this returns, no further event is
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the terminal fails.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<ProgressEvent>) -> io::Result<RenderOutcome> {
        let mut ticker = interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(ProgressEvent::Status(text)) => self.show(text, false)?,
                    Some(ProgressEvent::Progress { current, total, text }) => {
                        self.show(format!("{text} [{current}/{total}]"), true)?;
                    }
                    Some(ProgressEvent::Failure(err)) => {
                        self.show(err.to_string(), false)?;
                        self.finish()?;
                        return Ok(RenderOutcome::Failed(err));
                    }
                    None => {
                        self.finish()?;
                        return Ok(RenderOutcome::Done);
                    }
                },
                _ = ticker.tick() => {
                    let Some(monitor) = &self.monitor else { continue };
                    monitor.tick();
                    if self.overprint {
                        self.redraw()?;
                    }
                }
            }
        }
    }

    /// Returns the output sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn show(&mut self, line: String, overprint: bool) -> io::Result<()> {
        if self.overprint && overprint {
            write!(self.out, "{OVERPRINT}")?;
        } else if self.started {
            writeln!(self.out)?;
        }
        self.line = line;
        self.overprint = overprint;
        self.started = true;
        self.draw()
    }

    fn redraw(&mut self) -> io::Result<()> {
        write!(self.out, "{OVERPRINT}")?;
        self.draw()
    }

    fn draw(&mut self) -> io::Result<()> {
        write!(self.out, "{}", self.line)?;
        if self.overprint
            && let Some(monitor) = &self.monitor
        {
            write!(self.out, " [{:.1}k/s]", monitor.bandwidth() / 1000.0)?;
        }
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.started {
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn render<F, Fut>(work: F) -> (RenderOutcome, String)
    where
        F: FnOnce(Reporter) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (supervisor, rx) = spawn_worker(work);
        let mut renderer = Renderer::new(Vec::new());
        let outcome = renderer.run(rx).await.unwrap();
        supervisor.await.unwrap();
        (outcome, String::from_utf8(renderer.into_inner()).unwrap())
    }

    fn counters(output: &str) -> Vec<u32> {
        output
            .split(OVERPRINT)
            .flat_map(|chunk| chunk.lines())
            .filter_map(|line| {
                let inner = line.rsplit_once('[')?.1.strip_suffix(']')?;
                inner.split_once('/')?.0.parse().ok()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_progress_in_order_then_done() {
        let (outcome, output) = render(|reporter| async move {
            reporter.status("opening INBOX...").await;
            for i in 1..=5 {
                reporter.progress(i, 5, "fetching messages").await;
            }
            Ok(())
        })
        .await;

        assert!(outcome.is_done());
        assert_eq!(counters(&output), vec![1, 2, 3, 4, 5]);
        assert!(output.starts_with("opening INBOX...\nfetching messages [1/5]\r\x1B[K"));
        assert!(output.ends_with("fetching messages [5/5]\n"));
    }

    #[tokio::test]
    async fn test_status_after_progress_starts_new_line() {
        let (_, output) = render(|reporter| async move {
            reporter.progress(1, 1, "fetching messages").await;
            reporter.status("complete").await;
            Ok(())
        })
        .await;

        assert_eq!(output, "fetching messages [1/1]\ncomplete\n");
    }

    #[tokio::test]
    async fn test_worker_error_is_last_line() {
        let (outcome, output) = render(|reporter| async move {
            reporter.progress(1, 3, "fetching messages").await;
            Err(Error::Config("bad folder".into()))
        })
        .await;

        assert!(matches!(outcome, RenderOutcome::Failed(Error::Config(_))));
        assert!(output.ends_with("fetching messages [1/3]\nConfiguration error: bad folder\n"));
    }

    fn explode() -> Result<()> {
        panic!("decoder exploded")
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_failure() {
        let (outcome, output) = render(|reporter| async move {
            reporter.progress(1, 3, "fetching messages").await;
            reporter.progress(2, 3, "fetching messages").await;
            explode()
        })
        .await;

        let RenderOutcome::Failed(Error::WorkerPanicked(message)) = outcome else {
            panic!("expected a panic failure, got {outcome:?}");
        };
        assert_eq!(message, "decoder exploded");
        assert_eq!(counters(&output), vec![1, 2]);
        assert!(output.ends_with("fetch worker crashed: decoder exploded\n"));
    }

    #[tokio::test]
    async fn test_quiet_worker_prints_nothing() {
        let (outcome, output) = render(|_| async { Ok(()) }).await;
        assert!(outcome.is_done());
        assert!(output.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_appends_bandwidth() {
        let monitor = Arc::new(BandwidthMonitor::new());
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let reporter = Reporter { tx };

        let mut renderer = Renderer::new(Vec::new()).with_monitor(Arc::clone(&monitor));
        let driver = async move {
            reporter.progress(1, 2, "fetching messages").await;
            tokio::time::sleep(TICK * 2 + Duration::from_millis(10)).await;
            drop(reporter);
        };
        let (outcome, ()) = tokio::join!(renderer.run(rx), driver);

        assert!(outcome.unwrap().is_done());
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.starts_with("fetching messages [1/2] [0.0k/s]"));
        assert!(output.matches(OVERPRINT).count() >= 2);
    }
}
