//! Local telemetry bridge for Aseko ASIN AQUA pool dosing units.
//!
//! Units on the LAN push fixed 120-byte status frames over plain TCP.
//! This crate accepts those connections, decodes each frame into a typed
//! [`UnitReading`], keeps the last-known state per unit in a registry and
//! notifies subscribers whenever a reading actually changes. Optionally it
//! mirrors every raw frame to the vendor cloud so the official app keeps
//! working alongside the local integration.
//!
//! # Features
//!
//! - Fixed-length frame re-assembly over arbitrarily segmented TCP streams,
//!   with realignment of frames that start mid-page.
//! - Decoding for the Home, Net, Profi and Salt unit families, including
//!   per-family handling of the shared salinity / chlorine byte range.
//! - Change detection: subscribers see an update only when a published
//!   field differs from the unit's previous reading.
//! - Best-effort cloud mirroring with a bounded queue, lazy connects and
//!   exponential reconnect backoff. Mirroring never blocks or fails the
//!   local decode path.
//!
//! # Quick start
//!
//! ```no_run
//! use aquanet::{Aquanet, ServerConfig};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> aquanet::Result<()> {
//!     let server = Aquanet::serve(ServerConfig::default()).await?;
//!
//!     let mut updates = server.subscribe();
//!     while let Some(update) = updates.next().await {
//!         let reading = &update.reading;
//!         println!(
//!             "unit {} ({}): {:.1} °C, pH {:?}",
//!             reading.serial_number, reading.kind, reading.water_temperature, reading.ph,
//!         );
//!     }
//!
//!     server.stop().await;
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod decoder;
mod error;
mod forwarder;
mod registry;
mod server;
mod sink;
mod types;

pub use config::{
    DEFAULT_BIND_ADDRESS, DEFAULT_FORWARDER_HOST, DEFAULT_FORWARDER_PORT, DEFAULT_PORT,
    ForwarderConfig, ServerConfig,
};
pub use decoder::decode;
pub use error::{AquanetError, Result};
pub use forwarder::{Forwarder, ForwarderHandle};
pub use registry::{UnitRegistry, UpsertOutcome};
pub use server::Server;
pub use sink::RawSink;
pub use types::{
    DeviceKind, ElectrolyzerDirection, FRAME_LEN, ProbeSet, RawFrame, ReadingUpdate, TimeOfDay,
    Timestamp, UnitReading,
};

/// Entry point for running the bridge.
pub struct Aquanet;

impl Aquanet {
    /// Start a server from the given configuration.
    ///
    /// Convenience wrapper around [`Server::start`].
    pub async fn serve(config: ServerConfig) -> Result<Server> {
        Server::start(config).await
    }
}
