//! Incident triage evidence engine: deterministic and rule-based.
//!
//! Turns metric series, log records, and deploy history into ranked findings:
//! z-score anomaly detection, deploy-to-incident correlation scoring, stack frame
//! extraction, and one uniform result envelope around all of them.
//!
//! Every component is a pure function over its arguments; no I/O, no shared state.

pub mod anomaly;
pub mod config;
pub mod correlation;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod fingerprint;
pub mod history;
pub mod logs;
pub mod metrics;
pub mod normalize;
pub mod stack;
pub mod types;

pub use config::Config;
pub use engine::{Engine, Evidence};
pub use error::TriageError;
pub use types::{InboundRequest, ResultEnvelope};
