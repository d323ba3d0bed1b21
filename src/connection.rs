//! Per-connection read loop and frame re-assembly.
//!
//! Units push frames over plain TCP with no delimiter beyond the fixed
//! length, and the stream arrives with arbitrary segmentation. The handler
//! accumulates bytes and slices off one frame at a time, oldest first, so a
//! frame split across several reads decodes exactly like one delivered
//! whole.
//!
//! Decode failures are frame-local: the offending bytes are dropped and the
//! connection stays open. Forwarding and decoding are independent; every
//! raw frame goes to the sink regardless of whether it decodes.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::decoder;
use crate::error::AquanetError;
use crate::registry::UnitRegistry;
use crate::sink::RawSink;
use crate::types::{FRAME_LEN, RawFrame, ReadingUpdate};

const READ_CHUNK: usize = 1024;

/// Owns one accepted inbound connection for its whole lifetime.
pub(crate) struct ConnectionHandler {
    peer: String,
    registry: Arc<UnitRegistry>,
    updates: broadcast::Sender<ReadingUpdate>,
    raw_sink: Option<Arc<dyn RawSink>>,
}

impl ConnectionHandler {
    pub(crate) fn new(
        peer: String,
        registry: Arc<UnitRegistry>,
        updates: broadcast::Sender<ReadingUpdate>,
        raw_sink: Option<Arc<dyn RawSink>>,
    ) -> Self {
        Self { peer, registry, updates, raw_sink }
    }

    /// Read loop: runs until the peer closes, a read fails or the server
    /// shuts down. Errors never escape; they end only this connection.
    pub(crate) async fn run<R>(self, mut reader: R, cancel: CancellationToken)
    where
        R: AsyncRead + Unpin,
    {
        debug!(peer = %self.peer, "unit connected");

        let mut buffer: Vec<u8> = Vec::with_capacity(FRAME_LEN * 4);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(peer = %self.peer, "connection handler cancelled");
                    break;
                }
                read = reader.read(&mut chunk) => read,
            };

            match read {
                Ok(0) => {
                    debug!(peer = %self.peer, "peer closed the connection");
                    break;
                }
                Ok(count) => {
                    buffer.extend_from_slice(&chunk[..count]);
                    while buffer.len() >= FRAME_LEN {
                        let bytes: Vec<u8> = buffer.drain(..FRAME_LEN).collect();
                        self.process_frame(bytes).await;
                    }
                }
                Err(error) => {
                    let error = AquanetError::connection_failed_with_source("read failed", error);
                    debug!(peer = %self.peer, %error, "closing connection");
                    break;
                }
            }
        }

        debug!(peer = %self.peer, "unit disconnected");
    }

    async fn process_frame(&self, bytes: Vec<u8>) {
        let frame = match RawFrame::new(bytes) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(peer = %self.peer, %error, "dropping short frame slice");
                return;
            }
        };

        // Mirror the raw bytes first; the sink must see every frame even
        // when decoding fails.
        if let Some(sink) = &self.raw_sink {
            sink.consume(&frame).await;
        }

        let reading = match frame.realign().and_then(|aligned| decoder::decode(aligned.bytes())) {
            Ok(reading) => reading,
            Err(error) => {
                warn!(peer = %self.peer, %error, "dropping malformed frame");
                return;
            }
        };

        trace!(peer = %self.peer, serial = reading.serial_number, "frame decoded");

        let reading = Arc::new(reading);
        let outcome = self.registry.upsert((*reading).clone(), SystemTime::now());
        if outcome.changed {
            if outcome.first_seen {
                info!(serial = reading.serial_number, model = %reading.kind, "new unit discovered");
            }
            // Send only fails when nobody subscribes, which is fine.
            let _ = self.updates.send(ReadingUpdate { reading, first_seen: outcome.first_seen });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::base_frame;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::timeout;

    struct CaptureSink(Mutex<Vec<Vec<u8>>>);

    #[async_trait::async_trait]
    impl RawSink for CaptureSink {
        async fn consume(&self, frame: &RawFrame) {
            self.0.lock().unwrap().push(frame.bytes().to_vec());
        }
    }

    fn spawn_handler(
        raw_sink: Option<Arc<dyn RawSink>>,
    ) -> (tokio::io::DuplexStream, Arc<UnitRegistry>, broadcast::Receiver<ReadingUpdate>) {
        let (client, server) = tokio::io::duplex(4096);
        let registry = Arc::new(UnitRegistry::new());
        let (updates, update_rx) = broadcast::channel(16);

        let handler =
            ConnectionHandler::new("test".to_string(), Arc::clone(&registry), updates, raw_sink);
        tokio::spawn(handler.run(server, CancellationToken::new()));

        (client, registry, update_rx)
    }

    async fn next_update(rx: &mut broadcast::Receiver<ReadingUpdate>) -> ReadingUpdate {
        timeout(Duration::from_secs(2), rx.recv()).await.expect("no update received").unwrap()
    }

    #[tokio::test]
    async fn frame_split_across_reads_decodes_once() {
        let (mut client, registry, mut updates) = spawn_handler(None);
        let frame = base_frame();

        for part in [&frame[..31], &frame[31..32], &frame[32..]] {
            client.write_all(part).await.unwrap();
            client.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let update = next_update(&mut updates).await;
        assert!(update.first_seen);
        assert_eq!(update.reading.serial_number, 1234);
        assert_eq!(update.reading.ph, Some(7.2));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn coalesced_frames_each_decode() {
        let (mut client, registry, mut updates) = spawn_handler(None);

        let mut stream = base_frame().to_vec();
        let mut second = base_frame();
        second[14..16].copy_from_slice(&730u16.to_be_bytes());
        stream.extend_from_slice(&second);

        // Both frames in a single write.
        client.write_all(&stream).await.unwrap();

        assert_eq!(next_update(&mut updates).await.reading.ph, Some(7.2));
        assert_eq!(next_update(&mut updates).await.reading.ph, Some(7.3));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn malformed_frame_does_not_end_the_connection() {
        let (mut client, registry, mut updates) = spawn_handler(None);

        client.write_all(&[0xAB; FRAME_LEN]).await.unwrap();
        client.write_all(&base_frame()).await.unwrap();

        let update = next_update(&mut updates).await;
        assert_eq!(update.reading.serial_number, 1234);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn invalid_timestamp_frame_is_dropped() {
        let (mut client, _registry, mut updates) = spawn_handler(None);

        let mut bad = base_frame();
        bad[7] = 13; // month out of range
        client.write_all(&bad).await.unwrap();
        client.write_all(&base_frame()).await.unwrap();

        let update = next_update(&mut updates).await;
        assert!(update.first_seen);
    }

    #[tokio::test]
    async fn rotated_frame_is_realigned_before_decoding() {
        let (mut client, _registry, mut updates) = spawn_handler(None);

        let frame = base_frame();
        let mut rotated = frame[103..].to_vec();
        rotated.extend_from_slice(&frame[..103]);
        client.write_all(&rotated).await.unwrap();

        let update = next_update(&mut updates).await;
        assert_eq!(update.reading.serial_number, 1234);
        assert_eq!(update.reading.ph, Some(7.2));
    }

    #[tokio::test]
    async fn unchanged_reading_emits_no_update() {
        let (mut client, _registry, mut updates) = spawn_handler(None);

        client.write_all(&base_frame()).await.unwrap();
        client.write_all(&base_frame()).await.unwrap();
        let mut changed = base_frame();
        changed[14..16].copy_from_slice(&740u16.to_be_bytes());
        client.write_all(&changed).await.unwrap();

        assert_eq!(next_update(&mut updates).await.reading.ph, Some(7.2));
        // The duplicate frame is swallowed; the next update is the change.
        let update = next_update(&mut updates).await;
        assert_eq!(update.reading.ph, Some(7.4));
        assert!(!update.first_seen);
    }

    #[tokio::test]
    async fn raw_sink_sees_every_frame_even_malformed_ones() {
        let sink = Arc::new(CaptureSink(Mutex::new(Vec::new())));
        let (mut client, _registry, mut updates) =
            spawn_handler(Some(Arc::clone(&sink) as Arc<dyn RawSink>));

        client.write_all(&[0xAB; FRAME_LEN]).await.unwrap();
        client.write_all(&base_frame()).await.unwrap();
        next_update(&mut updates).await;

        let captured = sink.0.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0], vec![0xAB; FRAME_LEN]);
        assert_eq!(captured[1], base_frame().to_vec());
    }

    #[tokio::test]
    async fn cancellation_unblocks_a_pending_read() {
        let (client, server) = tokio::io::duplex(4096);
        let registry = Arc::new(UnitRegistry::new());
        let (updates, _update_rx) = broadcast::channel(16);
        let cancel = CancellationToken::new();

        let handler = ConnectionHandler::new("test".to_string(), registry, updates, None);
        let task = tokio::spawn(handler.run(server, cancel.clone()));

        // No bytes ever arrive; cancelling must still end the loop.
        cancel.cancel();
        timeout(Duration::from_secs(1), task).await.expect("handler should stop").unwrap();
        drop(client);
    }
}
