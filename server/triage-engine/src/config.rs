//! Engine configuration with sane defaults.
//!
//! Every field is optional in JSON; missing fields fall back to `Default`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TriageError;
use crate::types::DetectionMethod;

/// Top-level tunables for all evidence components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub anomaly: AnomalyConfig,
  pub correlation: CorrelationWeights,
  pub logs: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
  /// Method used when a request does not name one.
  pub method: DetectionMethod,
  /// |z| above this is anomalous (zscore), or raw value above this (static).
  pub threshold: f64,
  /// Peak (ms) above which a latency metric is called out as critical in summaries.
  pub latency_alert_ms: f64,
}

impl Default for AnomalyConfig {
  fn default() -> Self {
    Self {
      method: DetectionMethod::ZScore,
      threshold: 2.0,
      latency_alert_ms: 2000.0,
    }
  }
}

/// One proximity band: deploys at most `max_minutes` before the incident earn `score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityTier {
  pub max_minutes: f64,
  pub score: f64,
}

/// Additive weights for deploy-to-incident correlation scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationWeights {
  /// Bands are matched tightest-first regardless of listing order.
  pub proximity_tiers: Vec<ProximityTier>,
  /// Awarded once when any risk keyword appears in the commit message.
  pub relevance_score: f64,
  pub risk_keywords: Vec<String>,
  /// Base prior for messages carrying a change label.
  pub labeled_base: f64,
  pub unlabeled_base: f64,
  pub label_keywords: Vec<String>,
  /// Upper bound on the summed score.
  pub max_score: f64,
}

impl Default for CorrelationWeights {
  fn default() -> Self {
    Self {
      proximity_tiers: vec![
        ProximityTier { max_minutes: 15.0, score: 0.3 },
        ProximityTier { max_minutes: 30.0, score: 0.2 },
        ProximityTier { max_minutes: 60.0, score: 0.1 },
      ],
      relevance_score: 0.4,
      risk_keywords: ["config", "pool", "db", "timeout", "connection", "limit", "scaling"]
        .iter()
        .map(|s| s.to_string())
        .collect(),
      labeled_base: 0.2,
      unlabeled_base: 0.1,
      label_keywords: ["config", "feat", "fix"].iter().map(|s| s.to_string()).collect(),
      max_score: 1.0,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Max parsed-stack samples kept per log summary.
  pub sample_limit: usize,
  /// Bucket for records without an error code.
  pub default_error_code: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      sample_limit: 3,
      default_error_code: "UNKNOWN_ERROR".into(),
    }
  }
}

impl Config {
  /// Parse a (possibly partial) JSON config and validate it.
  pub fn from_json_str(s: &str) -> Result<Self, TriageError> {
    let config: Config = serde_json::from_str(s)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TriageError> {
    let raw = std::fs::read_to_string(path)?;
    Self::from_json_str(&raw)
  }

  pub fn validate(&self) -> Result<(), TriageError> {
    if !self.anomaly.threshold.is_finite() || self.anomaly.threshold < 0.0 {
      return Err(TriageError::config("anomaly.threshold must be a non-negative number"));
    }
    if !non_negative(self.anomaly.latency_alert_ms) {
      return Err(TriageError::config("anomaly.latency_alert_ms must be non-negative"));
    }

    let w = &self.correlation;
    for tier in &w.proximity_tiers {
      if !non_negative(tier.max_minutes) || !non_negative(tier.score) {
        return Err(TriageError::config(
          "correlation.proximity_tiers entries must be non-negative",
        ));
      }
    }
    let weights = [w.relevance_score, w.labeled_base, w.unlabeled_base];
    if !weights.iter().all(|v| non_negative(*v)) {
      return Err(TriageError::config("correlation weights must be non-negative"));
    }
    if w.max_score <= 0.0 || w.max_score > 1.0 || w.max_score.is_nan() {
      return Err(TriageError::config("correlation.max_score must be in (0, 1]"));
    }
    Ok(())
  }
}

/// False for negatives and NaN.
fn non_negative(v: f64) -> bool {
  v >= 0.0
}
