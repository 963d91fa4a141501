//! Stream instrumentation.
//!
//! The raw connection can be wrapped in decorators before it is handed to
//! the IMAP client:
//!
//! ```text
//! socket ──→ LoggingStream (--dump-protocol) ──→ MeteredStream (fetch runs) ──→ client
//! ```
//!
//! Every decorator is itself a [`ByteStream`], so the chain is a single boxed
//! trait object no matter which layers are enabled. Only the read side is
//! instrumented; writes pass straight through, which also keeps the LOGIN
//! password out of the protocol dump.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::trace;

use crate::time::{Clock, SystemClock};

/// Tracing target of the protocol dump.
pub const WIRE_TARGET: &str = "mboxmirror::wire";

/// Default number of bytes of each read chunk shown in the protocol dump.
pub const DEFAULT_DUMP_LIMIT: usize = 300;

/// Any bidirectional byte stream a mail client can run on.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

/// A type-erased decorator chain.
pub type BoxedStream = Box<dyn ByteStream>;

/// Which decorators to put in front of a connection.
#[derive(Debug, Clone, Default)]
pub struct Instrumentation {
    /// Tee reads to the [`WIRE_TARGET`] trace target, truncated to this many
    /// bytes per chunk.
    pub dump_limit: Option<usize>,
    /// Count received bytes into this monitor.
    pub monitor: Option<Arc<BandwidthMonitor>>,
}

impl Instrumentation {
    /// No decorators.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Enables the protocol dump with the default chunk limit.
    #[must_use]
    pub fn with_dump(mut self, enabled: bool) -> Self {
        self.dump_limit = if enabled {
            Some(DEFAULT_DUMP_LIMIT)
        } else {
            None
        };
        self
    }

    /// Attaches a bandwidth monitor.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<BandwidthMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Builds the decorator chain around `stream`.
    pub fn wrap<S: ByteStream + 'static>(&self, stream: S) -> BoxedStream {
        let mut stream: BoxedStream = Box::new(stream);
        if let Some(limit) = self.dump_limit {
            stream = Box::new(LoggingStream::new(stream, limit));
        }
        if let Some(monitor) = &self.monitor {
            stream = Box::new(MeteredStream::new(stream, Arc::clone(monitor)));
        }
        stream
    }
}

/// Tees every read chunk to the protocol dump.
#[derive(Debug)]
pub struct LoggingStream<S> {
    inner: S,
    limit: usize,
}

impl<S> LoggingStream<S> {
    /// Wraps `inner`, showing at most `limit` bytes of each chunk.
    pub const fn new(inner: S, limit: usize) -> Self {
        Self { inner, limit }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// Renders a chunk for the log, escaping control bytes.
fn printable(chunk: &[u8], limit: usize) -> String {
    if chunk.len() > limit {
        format!("{}...", chunk[..limit].escape_ascii())
    } else {
        chunk.escape_ascii().to_string()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for LoggingStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) {
            let chunk = &buf.filled()[before..];
            if !chunk.is_empty() {
                trace!(
                    target: WIRE_TARGET,
                    len = chunk.len(),
                    "S: {}",
                    printable(chunk, this.limit)
                );
            }
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for LoggingStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Counts bytes read through it into a [`BandwidthMonitor`].
#[derive(Debug)]
pub struct MeteredStream<S> {
    inner: S,
    monitor: Arc<BandwidthMonitor>,
}

impl<S> MeteredStream<S> {
    /// Wraps `inner`.
    pub const fn new(inner: S, monitor: Arc<BandwidthMonitor>) -> Self {
        Self { inner, monitor }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for MeteredStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) {
            this.monitor.record(buf.filled().len() - before);
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for MeteredStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Throughput measured over windows closed by [`tick`](Self::tick).
///
/// The reading side calls [`record`](Self::record) from the worker task while
/// the render loop calls `tick` and [`bandwidth`](Self::bandwidth); all three
/// take `&self` and may race freely.
pub struct BandwidthMonitor {
    window_bytes: AtomicU64,
    total_bytes: AtomicU64,
    window: Mutex<Window>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    rate: f64,
}

impl std::fmt::Debug for BandwidthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandwidthMonitor")
            .field("total_bytes", &self.total())
            .field("bandwidth", &self.bandwidth())
            .finish_non_exhaustive()
    }
}

impl Default for BandwidthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl BandwidthMonitor {
    /// Creates a monitor on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a monitor on the given clock; the first window starts now.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            window_bytes: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            window: Mutex::new(Window { started, rate: 0.0 }),
            clock,
        }
    }

    /// Adds `bytes` to the current window.
    pub fn record(&self, bytes: usize) {
        let bytes = bytes as u64;
        self.window_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Closes the current window and returns its rate in bytes per second.
    #[allow(clippy::cast_precision_loss)]
    pub fn tick(&self) -> f64 {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        let bytes = self.window_bytes.swap(0, Ordering::Relaxed);
        let now = self.clock.now();
        let secs = now.saturating_duration_since(window.started).as_secs_f64();

        window.rate = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };
        window.started = now;
        window.rate
    }

    /// Rate of the last closed window, in bytes per second.
    #[must_use]
    pub fn bandwidth(&self) -> f64 {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rate
    }

    /// Bytes seen since the monitor was created.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_test::io::Builder;

    use super::*;
    use crate::time::MockClock;

    #[test]
    fn test_bandwidth_windows() {
        let clock = MockClock::shared();
        let monitor = BandwidthMonitor::with_clock(clock.clone());
        assert_eq!(monitor.bandwidth(), 0.0);

        monitor.record(1500);
        monitor.record(500);
        clock.advance(Duration::from_secs(2));
        assert_eq!(monitor.tick(), 1000.0);
        assert_eq!(monitor.bandwidth(), 1000.0);

        clock.advance(Duration::from_millis(500));
        monitor.record(100);
        assert_eq!(monitor.tick(), 200.0);
        assert_eq!(monitor.total(), 2100);
    }

    #[test]
    fn test_tick_without_elapsed_time() {
        let clock = MockClock::shared();
        let monitor = BandwidthMonitor::with_clock(clock);
        monitor.record(10);
        assert_eq!(monitor.tick(), 0.0);
    }

    #[test]
    fn test_printable_truncates() {
        assert_eq!(printable(b"* OK\r\n", 300), "* OK\\r\\n");
        assert_eq!(printable(b"abcdef", 3), "abc...");
    }

    #[tokio::test]
    async fn test_decorators_are_transparent() {
        let mock = Builder::new()
            .write(b"A0001 NOOP\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let monitor = Arc::new(BandwidthMonitor::new());
        let mut stream = Instrumentation::none()
            .with_dump(true)
            .with_monitor(Arc::clone(&monitor))
            .wrap(mock);

        stream.write_all(b"A0001 NOOP\r\n").await.unwrap();
        let mut buf = vec![0u8; 15];
        stream.read_exact(&mut buf).await.unwrap();

        assert_eq!(buf, b"A0001 OK done\r\n");
        assert_eq!(monitor.total(), 15);
    }
}
