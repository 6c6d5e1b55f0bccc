//! Core types for the triage engine (JSON contracts + internal models).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the caller sends)
// ---------------------------------------------------------------------------

/// One inbound request line. The `agent` field selects the evidence component.
/// Unknown fields are silently ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "agent")]
pub enum InboundRequest {
  #[serde(rename = "metrics_agent")]
  Metrics(InboundMetricsRequest),
  #[serde(rename = "logs_agent")]
  Logs(InboundLogsRequest),
  #[serde(rename = "deploy_agent")]
  Deploy(InboundDeployRequest),
}

impl InboundRequest {
  pub fn context(&self) -> &RequestContext {
    match self {
      Self::Metrics(r) => &r.context,
      Self::Logs(r) => &r.context,
      Self::Deploy(r) => &r.context,
    }
  }
}

/// Fields shared by every request.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestContext {
  #[serde(default = "unknown_incident")]
  pub incident_id: String,
  /// Failure reported by the data-fetching collaborator, if any.
  #[serde(default)]
  pub error: Option<String>,
  /// Caller-written summary; always wins over the default one.
  #[serde(default)]
  pub summary: Option<String>,
}

fn unknown_incident() -> String {
  "INC-UNKNOWN".into()
}

impl Default for RequestContext {
  fn default() -> Self {
    Self {
      incident_id: unknown_incident(),
      error: None,
      summary: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMetricsRequest {
  #[serde(flatten)]
  pub context: RequestContext,
  /// Datapoints per metric name, chronological.
  #[serde(default)]
  pub series: BTreeMap<String, Vec<InboundDatapoint>>,
  #[serde(default)]
  pub method: Option<DetectionMethod>,
  #[serde(default)]
  pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundDatapoint {
  pub timestamp: String,
  #[serde(default)]
  pub value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundLogsRequest {
  #[serde(flatten)]
  pub context: RequestContext,
  #[serde(default)]
  pub records: Vec<InboundLogRecord>,
}

/// Log record as returned by a log query backend (`@timestamp`/`@message` accepted).
#[derive(Debug, Clone, Deserialize)]
pub struct InboundLogRecord {
  #[serde(default, rename = "@timestamp", alias = "timestamp")]
  pub timestamp: Option<String>,
  #[serde(default, rename = "@message", alias = "message")]
  pub message: Option<String>,
  #[serde(default)]
  pub level: Option<String>,
  #[serde(default)]
  pub error_code: Option<String>,
  #[serde(default)]
  pub stack_trace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundDeployRequest {
  #[serde(flatten)]
  pub context: RequestContext,
  /// When set, only deploys that concern this service are scored.
  #[serde(default)]
  pub service: Option<String>,
  /// Incident onset; defaults to the window end.
  #[serde(default)]
  pub incident_time: Option<String>,
  #[serde(default)]
  pub window: Option<InboundWindow>,
  #[serde(default)]
  pub deployments: Vec<InboundDeploy>,
  #[serde(default)]
  pub extra_keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundWindow {
  pub start: String,
  pub end: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundDeploy {
  #[serde(alias = "deploy_id")]
  pub id: String,
  pub timestamp: String,
  #[serde(default)]
  pub author: String,
  pub message: String,
  #[serde(default, alias = "full_details")]
  pub body: String,
  #[serde(default)]
  pub affected_files: Vec<String>,
  #[serde(default)]
  pub service: String,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDatapoint {
  pub timestamp: DateTime<Utc>,
  pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionMethod {
  #[serde(rename = "zscore")]
  ZScore,
  #[serde(rename = "static")]
  Static,
}

/// A flagged datapoint. `z_score` is absent under the static method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
  #[serde(flatten)]
  pub point: MetricDatapoint,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub z_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baseline {
  pub baseline_mean: f64,
  pub baseline_stddev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
  pub anomalies: Vec<Anomaly>,
  /// Omitted by the static method.
  #[serde(flatten)]
  pub baseline: Option<Baseline>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
  Rising,
  Recovering,
  Saturated,
  Stable,
}

/// Per-metric digest of an anomalous series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricFinding {
  pub metric_name: String,
  pub anomaly_start: DateTime<Utc>,
  pub baseline_avg: f64,
  pub peak_value: f64,
  pub change_factor: f64,
  pub trend: Trend,
}

/// Metrics whose first anomaly lands in the same minute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnsetCluster {
  /// Minute bucket ("YYYY-MM-DDTHH:MM").
  pub minute: String,
  pub metrics: Vec<String>,
}

// ---------------------------------------------------------------------------
// Deploy history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployEvent {
  pub id: String,
  pub timestamp: DateTime<Utc>,
  pub author: String,
  pub message: String,
  pub body: String,
  pub affected_files: BTreeSet<String>,
  pub service: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationRecord {
  #[serde(flatten)]
  pub deploy: DeployEvent,
  pub score: f64,
  /// Negative when the deploy landed after the incident.
  pub minutes_before_incident: f64,
  pub matched_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Correlation {
  pub top: Option<CorrelationRecord>,
  pub ranked: Vec<CorrelationRecord>,
}

/// Inclusive time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl TimeWindow {
  pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
    self.start <= *ts && *ts <= self.end
  }
}

// ---------------------------------------------------------------------------
// Stack traces + logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StackFrame {
  pub class_name: String,
  pub method: String,
  pub file: String,
  pub line: u32,
  pub qualified_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedStack {
  /// First frame in source order (top of trace).
  pub root_frame: StackFrame,
  pub call_chain: Vec<String>,
  /// Total matched frames, may exceed `call_chain.len()`.
  pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timestamp: Option<DateTime<Utc>>,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub level: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_code: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stack_trace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorTally {
  pub count: u64,
  pub first_seen: Option<DateTime<Utc>>,
  pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSample {
  pub record: LogRecord,
  pub parsed_stack: ParsedStack,
  pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogFindings {
  pub matched_entries: usize,
  pub error_summary: BTreeMap<String, ErrorTally>,
  pub sample_entries: Vec<LogSample>,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what we emit)
// ---------------------------------------------------------------------------

/// Anything an evidence component can report inside an envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Finding {
  Metric(MetricFinding),
  Logs(LogFindings),
  Deploy(CorrelationRecord),
}

impl From<MetricFinding> for Finding {
  fn from(f: MetricFinding) -> Self {
    Self::Metric(f)
  }
}

impl From<LogFindings> for Finding {
  fn from(f: LogFindings) -> Self {
    Self::Logs(f)
  }
}

impl From<CorrelationRecord> for Finding {
  fn from(r: CorrelationRecord) -> Self {
    Self::Deploy(r)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
  Completed,
  NoFindings,
  Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnvelopeMetadata {
  pub execution_time_ms: u32,
  pub findings_count: u32,
}

/// Uniform result of one evidence-component invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
  pub agent: String,
  pub incident_id: String,
  pub timestamp: DateTime<Utc>,
  pub status: EnvelopeStatus,
  pub findings: Vec<Finding>,
  pub summary: String,
  pub metadata: EnvelopeMetadata,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for invalid input lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
