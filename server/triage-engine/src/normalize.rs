//! Normalize inbound JSON records into typed internal models.
//!
//! Malformed input is rejected here, at the boundary, with the offending field
//! named; scoring code only ever sees validated records.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::error::TriageError;
use crate::types::*;

/// Parse an RFC 3339 timestamp, naming `field` on failure.
pub fn timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, TriageError> {
  DateTime::parse_from_rfc3339(raw.trim())
    .map(|ts| ts.with_timezone(&Utc))
    .map_err(|e| TriageError::validation(field, &format!("invalid RFC3339: {}", e)))
}

/// Validate one metric series; order is preserved as given.
pub fn datapoints(metric: &str, raw: &[InboundDatapoint]) -> Result<Vec<MetricDatapoint>, TriageError> {
  raw
    .iter()
    .enumerate()
    .map(|(i, p)| {
      let field = format!("series.{}[{}]", metric, i);
      let value = p
        .value
        .ok_or_else(|| TriageError::validation(&format!("{}.value", field), "missing"))?;
      if !value.is_finite() {
        return Err(TriageError::validation(&format!("{}.value", field), "must be finite"));
      }
      Ok(MetricDatapoint {
        timestamp: timestamp(&format!("{}.timestamp", field), &p.timestamp)?,
        value,
      })
    })
    .collect()
}

/// Logs Insights prints `@timestamp` without a `T` or an offset; it is UTC.
const INSIGHTS_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Log timestamps are informational, so an unreadable one is dropped rather than
/// failing the batch. Accepts RFC 3339 and the Logs Insights form.
pub fn log_timestamp(raw: &str) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
    return Some(ts.with_timezone(&Utc));
  }
  match NaiveDateTime::parse_from_str(raw, INSIGHTS_TIMESTAMP) {
    Ok(naive) => Some(naive.and_utc()),
    Err(e) => {
      debug!(raw, error = %e, "unreadable log timestamp dropped");
      None
    }
  }
}

pub fn log_record(raw: &InboundLogRecord) -> LogRecord {
  LogRecord {
    timestamp: raw.timestamp.as_deref().and_then(log_timestamp),
    message: raw.message.clone().unwrap_or_default(),
    level: raw.level.as_ref().map(|l| l.to_ascii_uppercase()),
    error_code: raw.error_code.clone().filter(|c| !c.is_empty()),
    stack_trace: raw.stack_trace.clone().filter(|s| !s.is_empty()),
  }
}

pub fn deploy(raw: &InboundDeploy) -> Result<DeployEvent, TriageError> {
  if raw.id.trim().is_empty() {
    return Err(TriageError::validation("deployments[].id", "must not be empty"));
  }
  Ok(DeployEvent {
    id: raw.id.clone(),
    timestamp: timestamp("deployments[].timestamp", &raw.timestamp)?,
    author: raw.author.clone(),
    message: raw.message.clone(),
    body: raw.body.clone(),
    affected_files: raw.affected_files.iter().map(|f| normalize_path(f)).collect(),
    service: raw.service.clone(),
  })
}

pub fn window(raw: &InboundWindow) -> Result<TimeWindow, TriageError> {
  let start = timestamp("window.start", &raw.start)?;
  let end = timestamp("window.end", &raw.end)?;
  if start > end {
    return Err(TriageError::validation("window", "start must not be after end"));
  }
  Ok(TimeWindow { start, end })
}

/// Incident onset for a deploy request: explicit time, else the window end.
pub fn incident_time(
  raw: Option<&str>,
  window: Option<&TimeWindow>,
) -> Result<DateTime<Utc>, TriageError> {
  match (raw, window) {
    (Some(t), _) => timestamp("incident_time", t),
    (None, Some(w)) => Ok(w.end),
    (None, None) => Err(TriageError::validation(
      "incident_time",
      "required when no window is given",
    )),
  }
}

/// Normalize a file path for stable comparison:
/// - backslash -> forward slash
/// - collapse repeated slashes
/// - strip leading ./
fn normalize_path(p: &str) -> String {
  let s = p.trim().replace('\\', "/");
  let mut out = String::with_capacity(s.len());
  let mut prev_slash = false;
  for ch in s.chars() {
    if ch == '/' {
      if !prev_slash {
        out.push('/');
      }
      prev_slash = true;
    } else {
      prev_slash = false;
      out.push(ch);
    }
  }
  if let Some(rest) = out.strip_prefix("./") {
    return rest.to_string();
  }
  out
}
