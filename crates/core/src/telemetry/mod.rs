//! Begin/finish run events for conversion jobs.
//!
//! Producers emit through a cloneable [`TelemetryHandle`]; a background
//! [`TelemetryWriter`] forwards envelopes to a [`TelemetrySink`]. Ingestion
//! and aggregation live outside this crate.

mod events;
mod handle;
mod sink;
mod writer;

pub use events::*;
pub use handle::*;
pub use sink::*;
pub use writer::*;
