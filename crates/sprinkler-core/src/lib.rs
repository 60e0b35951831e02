//! `sprinkler-core`: drive one relay from a remotely published on/off
//! document, switch it off again on schedule, and keep an audit trail.
//!
//! ```text
//! DocumentSource ──snapshots──► lifecycle::run ──► ActuationController
//!        ▲                                            │   │   │
//!        └────────────── mark_off (mirror) ───────────┘   │   └─► OutputSink
//!                                                         ▼
//!                                               AuditLogger ──► BlobStore
//! ```

pub mod audit;
pub mod config;
pub mod controller;
pub mod error;
pub mod io;
pub mod lifecycle;
pub mod output;
pub mod source;
pub mod types;

pub use audit::{AuditLogger, BlobStore, FsBlobStore, MemoryBlobStore};
pub use config::Config;
pub use controller::{ActuationController, PendingOffTimer};
pub use error::{Result, SprinklerError};
pub use output::{DryRunSink, OutputSink, SysfsGpio, RELAY_PIN};
pub use source::{DocumentSource, StateMirror};
pub use types::{ActuatorState, Level, LogEntry};
