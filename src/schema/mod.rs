//! Wire-facing input schema
//!
//! Clients send measurements in a lenient shape: numeric fields may
//! arrive as JSON numbers or numeric strings, and issue tags come in
//! several historical object shapes. This module owns the coercion of
//! that input into the strict [`crate::types::Measurement`] the engine
//! operates on.

mod measurement;

pub use measurement::{CoercionFlag, IssueInput, RawMeasurement, SignalValue};
