//! TCP listener and connection supervisor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast};
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connection::ConnectionHandler;
use crate::error::{AquanetError, Result};
use crate::forwarder::{Forwarder, ForwarderHandle};
use crate::registry::UnitRegistry;
use crate::sink::RawSink;
use crate::types::ReadingUpdate;

/// Capacity of the update broadcast channel. Slow subscribers that fall
/// further behind than this lose the oldest updates, not the newest.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// How long `stop` waits for in-flight connection handlers to notice
/// cancellation before abandoning them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A running listener for pool unit telemetry.
///
/// Accepts TCP connections from units, decodes their frames into the shared
/// [`UnitRegistry`] and broadcasts changed readings to subscribers. When the
/// configuration names a cloud mirror, every raw frame is also relayed there
/// on a best-effort basis.
pub struct Server {
    local_addr: SocketAddr,
    registry: Arc<UnitRegistry>,
    updates: broadcast::Sender<ReadingUpdate>,
    forwarder: Option<ForwarderHandle>,
    cancel: CancellationToken,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Bind the configured address and start accepting connections.
    pub async fn start(config: ServerConfig) -> Result<Self> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|error| AquanetError::bind_failed(addr.clone(), error))?;
        let local_addr = listener
            .local_addr()
            .map_err(|error| AquanetError::bind_failed(addr, error))?;

        let registry = Arc::new(UnitRegistry::new());
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let forwarder = config.forwarder.clone().map(Forwarder::spawn);
        let raw_sink = forwarder
            .clone()
            .map(|handle| Arc::new(handle) as Arc<dyn RawSink>);

        info!(%local_addr, mirror = forwarder.is_some(), "listening for pool units");

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&registry),
            updates.clone(),
            raw_sink,
            cancel.clone(),
        ));

        Ok(Self {
            local_addr,
            registry,
            updates,
            forwarder,
            cancel,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// The address the listener actually bound, useful with port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared view of the last-known readings.
    pub fn registry(&self) -> Arc<UnitRegistry> {
        Arc::clone(&self.registry)
    }

    /// Subscribe to changed readings.
    ///
    /// Each subscriber gets every update emitted after the call. Subscribers
    /// that lag more than the channel capacity skip ahead, dropping the
    /// oldest updates silently.
    pub fn subscribe(&self) -> impl Stream<Item = ReadingUpdate> + Send + Unpin + use<> {
        BroadcastStream::new(self.updates.subscribe()).filter_map(|update| update.ok())
    }

    /// Stop accepting connections and wind down handlers.
    ///
    /// Waits a bounded grace period for in-flight handlers; the bound port
    /// is free once this returns.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.accept_task.lock().await.take() {
            if let Err(error) = handle.await {
                warn!(%error, "accept loop ended abnormally");
            }
        }
        if let Some(forwarder) = &self.forwarder {
            forwarder.shutdown();
        }
        info!(local_addr = %self.local_addr, "server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(forwarder) = &self.forwarder {
            forwarder.shutdown();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<UnitRegistry>,
    updates: broadcast::Sender<ReadingUpdate>,
    raw_sink: Option<Arc<dyn RawSink>>,
    cancel: CancellationToken,
) {
    let mut handlers = JoinSet::new();

    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
            // Reap finished handlers so the set does not grow unbounded.
            Some(_) = handlers.join_next() => continue,
        };

        match accepted {
            Ok((stream, peer)) => {
                spawn_handler(
                    &mut handlers,
                    stream,
                    peer,
                    Arc::clone(&registry),
                    updates.clone(),
                    raw_sink.clone(),
                    cancel.child_token(),
                );
            }
            Err(error) => {
                // Transient accept errors (e.g. EMFILE) should not kill the
                // listener.
                warn!(%error, "accept failed");
            }
        }
    }

    // Release the port before waiting on handlers.
    drop(listener);

    // Handlers share the cancellation token; give them a moment to finish
    // cleanly before abandoning the stragglers.
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while handlers.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        debug!("shutdown grace expired, aborting remaining handlers");
        handlers.shutdown().await;
    }
}

fn spawn_handler(
    handlers: &mut JoinSet<()>,
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<UnitRegistry>,
    updates: broadcast::Sender<ReadingUpdate>,
    raw_sink: Option<Arc<dyn RawSink>>,
    cancel: CancellationToken,
) {
    let handler = ConnectionHandler::new(peer.to_string(), registry, updates, raw_sink);
    handlers.spawn(async move {
        handler.run(stream, cancel).await;
    });
}
