//! Resumable firehose subscription.
//!
//! [`Subscriber`] owns one connection at a time. A reader task pulls frames
//! off the socket into a bounded queue; the subscriber drains the queue in
//! order, decodes each commit, hands it to the [`ProjectionWriter`], and
//! advances the cursor only after the writer returns. Transport failures end
//! the session and reconnect with backoff from the last applied sequence
//! number. Storage failures are retried and become fatal when retries run out.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use graysky_core::error::TransportError;
use graysky_core::{
    CommitEvent, CursorStore, Firehose, FirehoseConnector, ProjectionWriter, RepoEvent, Result,
};

use crate::backoff::Backoff;
use crate::cursor::CursorTracker;
use crate::decoder::decode_commit;

/// Tuning knobs for a [`Subscriber`].
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// First reconnect delay.
    pub reconnect_delay: Duration,
    /// Upper bound for the reconnect delay.
    pub max_reconnect_delay: Duration,
    /// A connection attempt that has not completed the handshake by then is
    /// abandoned.
    pub connect_timeout: Duration,
    /// A session with no frames for this long is torn down.
    pub idle_timeout: Duration,
    /// Frames buffered between the socket reader and the dispatcher.
    pub queue_capacity: usize,
    /// Save the cursor after this many applied events.
    pub cursor_flush_every: u32,
    /// Retries for a failed storage operation before giving up.
    pub storage_retries: u32,
    /// Pause between storage retries.
    pub storage_retry_delay: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_delay: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            queue_capacity: 1024,
            cursor_flush_every: 20,
            storage_retries: 5,
            storage_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Connection state of a [`Subscriber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Disconnected,
    Connecting,
    Streaming,
    Closing,
}

impl fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubscriberState::Disconnected => "disconnected",
            SubscriberState::Connecting => "connecting",
            SubscriberState::Streaming => "streaming",
            SubscriberState::Closing => "closing",
        })
    }
}

/// How a streaming session ended.
enum Session {
    /// The connection dropped; `events` is how many frames it delivered.
    Ended { events: u64 },
    /// Shutdown was requested and the cursor has been flushed.
    Cancelled,
}

/// Aborts the reader task when the session ends.
struct ReaderTask(JoinHandle<()>);

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Consumes a firehose and feeds one projection, resuming across reconnects.
pub struct Subscriber<C, W, S> {
    connector: C,
    writer: W,
    store: S,
    config: SubscriberConfig,
    cursor: CursorTracker,
    state: watch::Sender<SubscriberState>,
}

impl<C, W, S> Subscriber<C, W, S>
where
    C: FirehoseConnector,
    W: ProjectionWriter,
    S: CursorStore,
{
    pub fn new(connector: C, writer: W, store: S, config: SubscriberConfig) -> Self {
        let (state, _) = watch::channel(SubscriberState::Disconnected);
        Self {
            connector,
            writer,
            store,
            cursor: CursorTracker::new(config.cursor_flush_every),
            config,
            state,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> SubscriberState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<SubscriberState> {
        self.state.subscribe()
    }

    /// Highest sequence number applied so far.
    pub fn cursor(&self) -> Option<i64> {
        self.cursor.high_water()
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Returns `Ok` after a clean shutdown. Returns an error only for fatal
    /// storage failures: the cursor could not be loaded or saved, or a
    /// projection write kept failing after all retries.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        let stored = with_retries(&self.config, "load cursor", || self.store.load()).await?;
        self.cursor.restore(stored);
        info!(cursor = ?stored, "Starting firehose subscription");

        let mut backoff = Backoff::new(self.config.reconnect_delay, self.config.max_reconnect_delay);

        while !shutdown.is_cancelled() {
            self.transition(SubscriberState::Connecting);
            let resume = self.cursor.high_water();

            let attempt = tokio::time::timeout(
                self.config.connect_timeout,
                self.connector.connect(resume),
            );
            let connected = tokio::select! {
                _ = shutdown.cancelled() => break,
                connected = attempt => connected.unwrap_or_else(|_| {
                    Err(TransportError::Connection {
                        message: format!(
                            "handshake did not complete within {}ms",
                            self.config.connect_timeout.as_millis()
                        ),
                    }
                    .into())
                }),
            };

            let session = match connected {
                Ok(firehose) => {
                    self.transition(SubscriberState::Streaming);
                    self.stream(firehose, &shutdown).await?
                }
                Err(e) => {
                    warn!(error = %e, "Failed to connect to firehose");
                    Session::Ended { events: 0 }
                }
            };

            let Session::Ended { events } = session else {
                break;
            };

            self.transition(SubscriberState::Disconnected);
            self.flush().await?;

            if events > 0 {
                backoff.reset();
            }
            let delay = backoff.next_delay();
            info!(
                delay_ms = delay.as_millis() as u64,
                attempt = backoff.attempt(),
                cursor = ?self.cursor.high_water(),
                "Reconnecting to firehose"
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.transition(SubscriberState::Closing);
        self.flush().await?;
        info!(cursor = ?self.cursor.committed(), "Firehose subscription stopped");
        Ok(())
    }

    async fn stream(
        &mut self,
        firehose: C::Firehose,
        shutdown: &CancellationToken,
    ) -> Result<Session> {
        let (tx, mut rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let _reader = ReaderTask(tokio::spawn(forward(firehose, tx)));
        let mut events = 0u64;

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.transition(SubscriberState::Closing);
                    self.flush().await?;
                    return Ok(Session::Cancelled);
                }
                received = tokio::time::timeout(self.config.idle_timeout, rx.recv()) => received,
            };

            let item = match received {
                Err(_) => {
                    let idle = TransportError::Idle {
                        duration_ms: self.config.idle_timeout.as_millis() as u64,
                    };
                    warn!(error = %idle, "Firehose session ended");
                    return Ok(Session::Ended { events });
                }
                Ok(None) => {
                    info!(events, "Firehose stream closed");
                    return Ok(Session::Ended { events });
                }
                Ok(Some(item)) => item,
            };

            match item {
                Ok(event) => {
                    events += 1;
                    self.handle_event(event).await?;
                }
                Err(e) if e.is_transport() => {
                    warn!(error = %e, "Firehose session ended");
                    return Ok(Session::Ended { events });
                }
                Err(e) => warn!(error = %e, "Skipping undecodable frame"),
            }
        }
    }

    async fn handle_event(&mut self, event: RepoEvent) -> Result<()> {
        let seq = event.seq();
        if let Some(seq) = seq {
            if self.cursor.is_replay(seq) {
                debug!(seq, "Skipping already applied event");
                return Ok(());
            }
        }

        match &event {
            RepoEvent::Commit(commit) => self.handle_commit(commit).await?,
            RepoEvent::Info(info) if info.name == "OutdatedCursor" => {
                warn!(message = ?info.message, "Cursor is older than the server's backfill window, events were missed");
            }
            RepoEvent::Info(info) => info!(name = %info.name, message = ?info.message, "Firehose info"),
            other => trace!(kind = other.kind(), seq = ?seq, "Ignoring event"),
        }

        if let Some(seq) = seq {
            if self.cursor.advance(seq) {
                self.flush().await?;
            }
        }
        Ok(())
    }

    async fn handle_commit(&self, commit: &CommitEvent) -> Result<()> {
        let ops = match decode_commit(commit) {
            Ok(ops) => ops,
            Err(e) => {
                warn!(seq = commit.seq, repo = %commit.repo, error = %e, "Skipping undecodable commit");
                return Ok(());
            }
        };

        if ops.is_empty() {
            return Ok(());
        }

        with_retries(&self.config, "apply commit", || self.writer.apply(&ops)).await?;
        trace!(seq = commit.seq, ops = ops.len(), "Applied commit");
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let Some(seq) = self.cursor.pending() else {
            return Ok(());
        };
        with_retries(&self.config, "save cursor", || self.store.save(seq)).await?;
        self.cursor.mark_committed(seq);
        debug!(cursor = seq, "Saved cursor");
        Ok(())
    }

    fn transition(&self, next: SubscriberState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "Subscriber state changed");
        }
    }
}

async fn forward<F>(mut firehose: F, tx: mpsc::Sender<Result<RepoEvent>>)
where
    F: Firehose + Unpin,
{
    while let Some(item) = firehose.next().await {
        if tx.send(item).await.is_err() {
            break;
        }
    }
}

async fn with_retries<T, F, Fut>(config: &SubscriberConfig, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.storage_retries => {
                attempt += 1;
                warn!(what, attempt, error = %e, "Storage operation failed, retrying");
                tokio::time::sleep(config.storage_retry_delay).await;
            }
            Err(e) => {
                error!(what, attempts = attempt + 1, error = %e, "Storage operation failed, giving up");
                return Err(e);
            }
        }
    }
}
