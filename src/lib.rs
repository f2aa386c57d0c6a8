//! Posture Engine - posture evaluation and aggregation backend core
//!
//! The engine accepts body-landmark measurements from a client-side
//! pose-estimation frontend and turns them into feedback and history:
//! boundary coercion → classification against medical thresholds →
//! per-user persistence → rolling statistics and daily trends.
//!
//! ## Modules
//!
//! - **schema**: lenient wire input and its coercion rules
//! - **classifier**: per-measurement evaluation and severity
//! - **store**: SQLite persistence for records and accounts
//! - **stats / trends**: trailing-window aggregation
//! - **sessions**: ephemeral in-memory measurement sessions
//! - **accounts**: registration, login support, password reset
//! - **engine**: the facade the transport layer calls

pub mod accounts;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod schema;
pub mod sessions;
pub mod stats;
pub mod store;
pub mod thresholds;
pub mod trends;
pub mod types;

pub use accounts::{AccountService, PasswordHasher, Registration};
pub use classifier::Classifier;
pub use engine::PostureEngine;
pub use error::EngineError;
pub use schema::RawMeasurement;
pub use sessions::{SessionRegistry, StartSession};
pub use stats::StatsAggregator;
pub use store::RecordStore;
pub use thresholds::MedicalThresholds;
pub use trends::TrendAggregator;
pub use types::{Classification, DailyTrend, EvaluatedRecord, Measurement, StatsSummary};

/// Engine version embedded in CLI output
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported alongside results
pub const PRODUCER_NAME: &str = "posture-engine";
