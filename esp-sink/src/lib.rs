//! In-memory telemetry sink for ESP BLE bridge devices.
//!
//! Devices POST readings over HTTP. Every reading lands in two views owned by
//! a single [`EntryStore`]: an active set bounded by a freshness window and an
//! unbounded history log. A background [`Sweeper`] evicts stale entries from
//! the active set; ingestion and the active query also sweep inline.

pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod http;
pub mod service;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SinkConfig;
pub use entry::{DeviceKind, Entry, Payload};
pub use error::{SinkError, SinkResult};
pub use http::{router, serve};
pub use service::{IngestReceipt, TelemetrySink};
pub use store::EntryStore;
pub use sweeper::Sweeper;
