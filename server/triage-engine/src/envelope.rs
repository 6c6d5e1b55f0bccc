//! Uniform result envelope shared by every evidence component.
//!
//! The builder is a pure formatter: timing comes from the caller, never the clock.

use chrono::{DateTime, Utc};

use crate::types::{EnvelopeMetadata, EnvelopeStatus, Finding, ResultEnvelope};

/// Start/end instants of one component invocation, measured by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
}

impl Timing {
  pub fn new(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
    Self {
      started_at,
      finished_at,
    }
  }

  /// Elapsed milliseconds, clamped into `u32` (clock skew gives 0).
  pub fn elapsed_ms(&self) -> u32 {
    let ms = (self.finished_at - self.started_at).num_milliseconds();
    ms.clamp(0, u32::MAX as i64) as u32
  }
}

/// Status priority: error, then findings, then nothing.
pub fn status_for(findings: &[Finding], error: Option<&str>) -> EnvelopeStatus {
  if error.is_some() {
    EnvelopeStatus::Failed
  } else if !findings.is_empty() {
    EnvelopeStatus::Completed
  } else {
    EnvelopeStatus::NoFindings
  }
}

/// Summary used only when the caller did not write one.
pub fn default_summary(findings: &[Finding], error: Option<&str>) -> String {
  match error {
    Some(e) => format!("Agent execution failed: {}", e),
    None if !findings.is_empty() => format!("Agent found {} anomalies/issues.", findings.len()),
    None => "No anomalies or significant issues detected.".to_string(),
  }
}

/// Wrap one component's findings.
///
/// A supplied `summary` is kept verbatim, even when empty.
pub fn build(
  agent: &str,
  incident_id: &str,
  findings: Vec<Finding>,
  timing: Timing,
  error: Option<String>,
  summary: Option<String>,
) -> ResultEnvelope {
  let status = status_for(&findings, error.as_deref());
  // Only a missing summary is defaulted; `Some("")` is the caller's choice and stays.
  let summary = summary.unwrap_or_else(|| default_summary(&findings, error.as_deref()));
  let metadata = EnvelopeMetadata {
    execution_time_ms: timing.elapsed_ms(),
    findings_count: u32::try_from(findings.len()).unwrap_or(u32::MAX),
  };

  ResultEnvelope {
    agent: agent.to_string(),
    incident_id: incident_id.to_string(),
    timestamp: timing.finished_at,
    status,
    findings,
    summary,
    metadata,
    error,
  }
}
