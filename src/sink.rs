//! Sink abstraction for raw inbound frames.

use crate::types::RawFrame;

/// Consumer of raw, undecoded frames.
///
/// The connection handler hands every received frame to the configured sink
/// independent of decode success. Implementations must be best-effort and
/// non-blocking: a slow or failing sink must never hold up local decoding.
#[async_trait::async_trait]
pub trait RawSink: Send + Sync {
    async fn consume(&self, frame: &RawFrame);
}
