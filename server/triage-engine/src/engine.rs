//! Core engine: routes one inbound request to the evidence components.
//!
//! The engine holds only immutable config, so one instance can serve any number of
//! requests from any thread. It stops short of the envelope: callers stamp the
//! timing and call `Evidence::into_envelope`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::anomaly;
use crate::config::Config;
use crate::correlation;
use crate::envelope::{self, Timing};
use crate::error::TriageError;
use crate::history::{self, AnyDeploy, MentionsService};
use crate::logs;
use crate::metrics;
use crate::normalize;
use crate::types::*;

pub const METRICS_AGENT: &str = "metrics_agent";
pub const LOGS_AGENT: &str = "logs_agent";
pub const DEPLOY_AGENT: &str = "deploy_agent";

/// Findings of one component invocation, ready to be wrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
  pub agent: &'static str,
  pub incident_id: String,
  pub findings: Vec<Finding>,
  pub error: Option<String>,
  pub summary: Option<String>,
}

impl Evidence {
  pub fn into_envelope(self, timing: Timing) -> ResultEnvelope {
    envelope::build(
      self.agent,
      &self.incident_id,
      self.findings,
      timing,
      self.error,
      self.summary,
    )
  }
}

/// Anomalous metrics plus any onset they share.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricAnalysis {
  pub findings: Vec<MetricFinding>,
  pub shared_onset: Option<OnsetCluster>,
}

/// Findings plus the summary a handler derived from them, if any.
type Narrated = (Vec<Finding>, Option<String>);

/// The triage engine.
pub struct Engine {
  config: Config,
}

impl Engine {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  /// Process a single inbound request.
  ///
  /// An upstream `error` short-circuits to a failed result without reading the
  /// payload. Malformed payloads return `Err` naming the bad field. A caller
  /// summary is passed through; otherwise metrics and logs narrate their findings.
  pub fn process(&self, req: &InboundRequest) -> Result<Evidence, TriageError> {
    let ctx = req.context();
    let agent = match req {
      InboundRequest::Metrics(_) => METRICS_AGENT,
      InboundRequest::Logs(_) => LOGS_AGENT,
      InboundRequest::Deploy(_) => DEPLOY_AGENT,
    };

    if let Some(error) = &ctx.error {
      warn!(agent, incident_id = %ctx.incident_id, %error, "upstream collector failed");
      return Ok(Evidence {
        agent,
        incident_id: ctx.incident_id.clone(),
        findings: Vec::new(),
        error: Some(error.clone()),
        summary: ctx.summary.clone(),
      });
    }

    let (findings, narrative) = match req {
      InboundRequest::Metrics(r) => self.metrics_request(r)?,
      InboundRequest::Logs(r) => self.logs_request(r)?,
      InboundRequest::Deploy(r) => self.deploy_request(r)?,
    };

    info!(
      agent,
      incident_id = %ctx.incident_id,
      findings = findings.len(),
      "evidence collected"
    );

    Ok(Evidence {
      agent,
      incident_id: ctx.incident_id.clone(),
      findings,
      error: None,
      summary: ctx.summary.clone().or(narrative),
    })
  }

  /// Run detection on every series (in name order) and digest the anomalous ones.
  pub fn analyze_metrics(
    &self,
    series: &BTreeMap<String, Vec<MetricDatapoint>>,
    method: DetectionMethod,
    threshold: f64,
  ) -> MetricAnalysis {
    let findings: Vec<MetricFinding> = series
      .iter()
      .filter_map(|(name, points)| {
        let report = anomaly::detect(points, method, threshold);
        metrics::summarize(name, points, &report)
      })
      .collect();
    let shared_onset = metrics::shared_onset(&findings);

    if let Some(cluster) = &shared_onset {
      info!(
        minute = %cluster.minute,
        metrics = ?cluster.metrics,
        "anomalies share an onset"
      );
    }

    MetricAnalysis {
      findings,
      shared_onset,
    }
  }

  /// Tally and sample a log batch. `None` when the batch is empty.
  pub fn analyze_logs(&self, records: &[LogRecord]) -> Option<LogFindings> {
    if records.is_empty() {
      return None;
    }
    Some(logs::summarize(records, &self.config.logs))
  }

  /// Filter history to the window and service (when given), then rank it.
  pub fn analyze_deploys(
    &self,
    deployments: &[DeployEvent],
    window: Option<&TimeWindow>,
    service: Option<&str>,
    incident_time: &DateTime<Utc>,
    extra_keywords: &[String],
  ) -> Correlation {
    let relevant = match service {
      Some(s) => history::filter(deployments, window, &MentionsService::new(s)),
      None => history::filter(deployments, window, &AnyDeploy),
    };
    debug!(
      total = deployments.len(),
      relevant = relevant.len(),
      "deploy history filtered"
    );
    correlation::correlate(&relevant, incident_time, extra_keywords, &self.config.correlation)
  }

  fn metrics_request(&self, r: &InboundMetricsRequest) -> Result<Narrated, TriageError> {
    let threshold = r.threshold.unwrap_or(self.config.anomaly.threshold);
    if !threshold.is_finite() || threshold < 0.0 {
      return Err(TriageError::validation("threshold", "must be a non-negative number"));
    }
    let method = r.method.unwrap_or(self.config.anomaly.method);

    let mut series = BTreeMap::new();
    for (name, raw) in &r.series {
      series.insert(name.clone(), normalize::datapoints(name, raw)?);
    }

    let analysis = self.analyze_metrics(&series, method, threshold);
    let narrative = metrics::narrative(
      &analysis.findings,
      analysis.shared_onset.as_ref(),
      self.config.anomaly.latency_alert_ms,
    );
    Ok((analysis.findings.into_iter().map(Finding::from).collect(), narrative))
  }

  fn logs_request(&self, r: &InboundLogsRequest) -> Result<Narrated, TriageError> {
    let records: Vec<LogRecord> = r.records.iter().map(normalize::log_record).collect();

    let Some(findings) = self.analyze_logs(&records) else {
      return Ok((Vec::new(), None));
    };
    let narrative = findings.narrative();
    Ok((vec![Finding::from(findings)], narrative))
  }

  fn deploy_request(&self, r: &InboundDeployRequest) -> Result<Narrated, TriageError> {
    let window = r.window.as_ref().map(normalize::window).transpose()?;
    let incident_time = normalize::incident_time(r.incident_time.as_deref(), window.as_ref())?;
    let deployments = r
      .deployments
      .iter()
      .map(normalize::deploy)
      .collect::<Result<Vec<_>, TriageError>>()?;

    let correlation = self.analyze_deploys(
      &deployments,
      window.as_ref(),
      r.service.as_deref().filter(|s| !s.trim().is_empty()),
      &incident_time,
      &r.extra_keywords,
    );
    Ok((correlation.ranked.into_iter().map(Finding::from).collect(), None))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn request(json: &str) -> InboundRequest {
    serde_json::from_str(json).unwrap()
  }

  fn timing() -> Timing {
    let t = Utc.with_ymd_and_hms(2026, 2, 6, 15, 0, 0).unwrap();
    Timing::new(t, t)
  }

  #[test]
  fn upstream_error_yields_failed_envelope() {
    let engine = Engine::with_defaults();
    let req = request(
      r#"{"agent":"deploy_agent","incident_id":"INC-7","error":"Git command failed",
          "deployments":[{"id":"x","timestamp":"bad","message":"m"}]}"#,
    );
    let env = engine.process(&req).unwrap().into_envelope(timing());
    assert_eq!(env.status, EnvelopeStatus::Failed);
    assert_eq!(env.agent, "deploy_agent");
    assert!(env.summary.contains("Git command failed"));
    assert!(env.findings.is_empty());
  }

  #[test]
  fn metrics_request_flags_spiking_series() {
    let engine = Engine::with_defaults();
    let mut points = Vec::new();
    for m in 0..9 {
      points.push(format!(r#"{{"timestamp":"2026-02-06T14:3{}:00Z","value":120}}"#, m));
    }
    points.push(r#"{"timestamp":"2026-02-06T14:45:00Z","value":2400}"#.to_string());
    let json = format!(
      r#"{{"agent":"metrics_agent","incident_id":"INC-1","series":{{"Latency":[{}],"CPU":[{}]}}}}"#,
      points.join(","),
      r#"{"timestamp":"2026-02-06T14:45:00Z","value":40}"#
    );

    let evidence = engine.process(&request(&json)).unwrap();
    assert_eq!(evidence.findings.len(), 1);
    match &evidence.findings[0] {
      Finding::Metric(f) => {
        assert_eq!(f.metric_name, "Latency");
        assert_eq!(f.baseline_avg, 120.0);
        assert_eq!(f.peak_value, 2400.0);
      }
      other => panic!("unexpected finding {:?}", other),
    }
  }

  #[test]
  fn negative_threshold_is_rejected() {
    let engine = Engine::with_defaults();
    let req = request(r#"{"agent":"metrics_agent","threshold":-2,"series":{}}"#);
    let err = engine.process(&req).unwrap_err();
    assert!(err.to_string().contains("threshold"));
  }

  #[test]
  fn empty_logs_have_no_findings() {
    let engine = Engine::with_defaults();
    let env = engine
      .process(&request(r#"{"agent":"logs_agent","records":[]}"#))
      .unwrap()
      .into_envelope(timing());
    assert_eq!(env.status, EnvelopeStatus::NoFindings);
    assert_eq!(env.incident_id, "INC-UNKNOWN");
  }

  #[test]
  fn deploy_request_filters_by_service_and_window() {
    let engine = Engine::with_defaults();
    let req = request(
      r#"{
        "agent":"deploy_agent",
        "service":"checkout-service",
        "incident_time":"2026-02-06T14:45:00Z",
        "window":{"start":"2026-02-06T11:00:00Z","end":"2026-02-06T15:00:00Z"},
        "deployments":[
          {"id":"hash123","timestamp":"2026-02-06T14:40:00Z","message":"Config change: Reduce DB pool size","service":"checkout-service"},
          {"id":"hash456","timestamp":"2026-02-06T12:00:00Z","message":"Add mock data"},
          {"id":"hash789","timestamp":"2026-02-05T12:00:00Z","message":"checkout-service config","service":"checkout-service"}
        ]
      }"#,
    );
    let evidence = engine.process(&req).unwrap();
    assert_eq!(evidence.findings.len(), 1);
    match &evidence.findings[0] {
      Finding::Deploy(r) => {
        assert_eq!(r.deploy.id, "hash123");
        assert_eq!(r.score, 0.9);
      }
      other => panic!("unexpected finding {:?}", other),
    }
  }

  #[test]
  fn deploy_touching_service_directory_is_relevant() {
    let engine = Engine::with_defaults();
    let req = request(
      r#"{
        "agent":"deploy_agent",
        "service":"checkout-service",
        "incident_time":"2026-02-06T14:45:00Z",
        "deployments":[
          {"id":"mono1","timestamp":"2026-02-06T14:40:00Z","message":"Raise timeout",
           "affected_files":[".\\services\\checkout-service\\settings.py"]},
          {"id":"mono2","timestamp":"2026-02-06T14:41:00Z","message":"Raise timeout",
           "affected_files":["services/payment-service/settings.py"]}
        ]
      }"#,
    );
    let evidence = engine.process(&req).unwrap();
    assert_eq!(evidence.findings.len(), 1);
    match &evidence.findings[0] {
      Finding::Deploy(r) => {
        assert_eq!(r.deploy.id, "mono1");
        assert!(r.deploy.affected_files.contains("services/checkout-service/settings.py"));
      }
      other => panic!("unexpected finding {:?}", other),
    }
  }

  #[test]
  fn deploy_request_without_time_is_rejected() {
    let engine = Engine::with_defaults();
    let req = request(r#"{"agent":"deploy_agent","deployments":[]}"#);
    let err = engine.process(&req).unwrap_err();
    assert!(err.to_string().contains("incident_time"));
  }
}
