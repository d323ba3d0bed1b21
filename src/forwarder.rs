//! Best-effort cloud mirror.
//!
//! A single worker task owns at most one outbound TCP connection and relays
//! raw frames byte-for-byte to the configured remote. The relay path is
//! deliberately lossy: when the bounded queue overflows the oldest queued
//! frame is evicted so the mirror keeps pace with the live stream, and
//! frames are dropped when the remote is unreachable or a write fails.
//! Nothing is buffered for replay and nothing here can block or fail the
//! inbound decode path. Reconnects use exponential backoff, reset after a
//! successful write.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::ForwarderConfig;
use crate::error::{AquanetError, Result};
use crate::sink::RawSink;
use crate::types::RawFrame;

/// Spawns the mirror worker task.
pub struct Forwarder;

impl Forwarder {
    /// Spawn a mirror worker for the given target.
    ///
    /// The outbound connection is established lazily, before the first
    /// relay. The worker runs until [`ForwarderHandle::shutdown`] is called.
    pub fn spawn(config: ForwarderConfig) -> ForwarderHandle {
        let queue = Arc::new(RelayQueue::new(config.queue_capacity.max(1)));
        let cancel = CancellationToken::new();

        tokio::spawn(worker(config, Arc::clone(&queue), cancel.clone()));

        ForwarderHandle { queue, cancel }
    }
}

/// Bounded FIFO between the relay callers and the worker.
///
/// Overflow evicts from the front: the newest frame always gets in and the
/// oldest one makes room. An `mpsc` channel cannot evict from the sender
/// side, hence the mutex-guarded deque with a [`Notify`] wakeup.
#[derive(Debug)]
struct RelayQueue {
    frames: Mutex<VecDeque<Arc<[u8]>>>,
    capacity: usize,
    notify: Notify,
}

impl RelayQueue {
    fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Enqueue a frame, evicting the oldest when full.
    ///
    /// Returns whether a frame was evicted.
    fn push(&self, frame: Arc<[u8]>) -> bool {
        let mut frames = self.frames.lock().expect("relay queue lock poisoned");
        let evicted = frames.len() == self.capacity;
        if evicted {
            frames.pop_front();
        }
        frames.push_back(frame);
        drop(frames);

        self.notify.notify_one();
        evicted
    }

    /// Wait for the next frame, oldest first.
    async fn next(&self) -> Arc<[u8]> {
        loop {
            if let Some(frame) = self.frames.lock().expect("relay queue lock poisoned").pop_front()
            {
                return frame;
            }
            self.notify.notified().await;
        }
    }
}

/// Handle for relaying frames to the mirror worker.
///
/// Cheap to clone; all clones feed the same worker, which serializes writes
/// on the single outbound socket.
#[derive(Debug, Clone)]
pub struct ForwarderHandle {
    queue: Arc<RelayQueue>,
    cancel: CancellationToken,
}

impl ForwarderHandle {
    /// Queue one raw frame for relay. Never blocks the caller.
    ///
    /// A full queue evicts its oldest frame to admit this one, so after an
    /// outage the mirror resumes with the most recent state instead of
    /// replaying stale frames. Mirroring stays at-most-once.
    pub fn relay(&self, frame: &RawFrame) {
        if self.cancel.is_cancelled() {
            debug!("mirror worker stopped, frame dropped");
            return;
        }
        if self.queue.push(frame.shared_bytes()) {
            debug!("mirror queue full, oldest frame dropped");
        }
    }

    /// Stop the worker and close the outbound connection.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[async_trait::async_trait]
impl RawSink for ForwarderHandle {
    async fn consume(&self, frame: &RawFrame) {
        self.relay(frame);
    }
}

/// Connection loop: consume the queue, reconnecting with backoff.
async fn worker(config: ForwarderConfig, queue: Arc<RelayQueue>, cancel: CancellationToken) {
    let remote = config.remote_addr();
    let mut link: Option<TcpStream> = None;
    let mut backoff = config.initial_backoff();

    info!(%remote, "cloud mirror started");

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = queue.next() => frame,
        };

        if link.is_none() {
            match connect(&config).await {
                Ok(stream) => {
                    info!(%remote, "cloud mirror connected");
                    link = Some(stream);
                }
                Err(error) => {
                    debug!(%remote, %error, "mirror connect failed, frame dropped");
                    // Back off without blocking shutdown, then let future
                    // relays retry the connect.
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = next_backoff(backoff, &config);
                    continue;
                }
            }
        }

        if let Some(stream) = link.as_mut() {
            match write_frame(stream, &frame, config.write_timeout()).await {
                Ok(()) => {
                    trace!(bytes = frame.len(), "frame mirrored");
                    backoff = config.initial_backoff();
                }
                Err(error) => {
                    debug!(%remote, %error, "mirror write failed, frame dropped");
                    link = None;
                }
            }
        }
    }

    info!(%remote, "cloud mirror stopped");
}

async fn connect(config: &ForwarderConfig) -> Result<TcpStream> {
    let remote = config.remote_addr();
    match timeout(config.connect_timeout(), TcpStream::connect(&remote)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(error)) => {
            Err(AquanetError::forward_failed(format!("connect to {remote}"), Some(error)))
        }
        Err(_) => Err(AquanetError::forward_failed(format!("connect to {remote} timed out"), None)),
    }
}

async fn write_frame(stream: &mut TcpStream, frame: &[u8], limit: Duration) -> Result<()> {
    match timeout(limit, stream.write_all(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(AquanetError::forward_failed("relay write", Some(error))),
        Err(_) => Err(AquanetError::forward_failed("relay write timed out", None)),
    }
}

fn next_backoff(current: Duration, config: &ForwarderConfig) -> Duration {
    (current * 2).min(config.max_backoff())
}
