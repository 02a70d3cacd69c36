//! ==============================================================================
//! lib.rs - telemetry dashboard library
//! ==============================================================================
//!
//! purpose:
//!     live ingestion engine for the motor rig: a transport adapter feeds
//!     raw topic messages into a single-writer engine, which decodes them,
//!     merges them into one snapshot, integrates power into energy and
//!     tracks link health. presentation layers read snapshots through
//!     `StatePublisher`.
//!
//! data flow:
//!
//! ```text
//!     broker / device socket
//!              │ TransportEvent (mpsc)
//!              ▼
//!     ┌─────────────────┐   EngineCommand (mpsc)   ┌──────────────┐
//!     │ IngestionEngine │ ◄─────────────────────── │  http server │
//!     │  decode, merge, │                          │  (axum)      │
//!     │  energy, health │ ───────────────────────► │              │
//!     └────────┬────────┘   Arc<TelemetrySnapshot> └──────────────┘
//!              │            (watch)
//!              ▼
//!        ReadingSink (optional http push)
//! ```
//!
//! ==============================================================================

pub mod clock;
pub mod config;
pub mod decode;
pub mod domain;
pub mod energy;
pub mod engine;
pub mod health;
pub mod logging;
pub mod publisher;
pub mod server;
pub mod session;
pub mod sink;
pub mod transport;
pub mod visual;

pub use config::DashboardConfig;
pub use domain::TelemetrySnapshot;
pub use publisher::StatePublisher;
pub use session::DashboardSession;
