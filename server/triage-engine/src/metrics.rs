//! Per-metric findings: peak vs. baseline, trend, and shared onset across metrics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::{AnomalyReport, MetricDatapoint, MetricFinding, OnsetCluster, Trend};

/// Format a timestamp into a minute bucket key: "YYYY-MM-DDTHH:MM".
pub fn minute_bucket(ts: &DateTime<Utc>) -> String {
  ts.format("%Y-%m-%dT%H:%M").to_string()
}

/// Digest one series and its report. `None` when nothing was flagged.
pub fn summarize(name: &str, points: &[MetricDatapoint], report: &AnomalyReport) -> Option<MetricFinding> {
  let first = report.anomalies.first()?;

  let peak_value = points
    .iter()
    .map(|p| p.value)
    .fold(f64::NEG_INFINITY, f64::max);
  let baseline_avg = report.baseline.map(|b| b.baseline_mean).unwrap_or(0.0);
  let change_factor = if baseline_avg > 0.0 {
    peak_value / baseline_avg
  } else {
    0.0
  };

  Some(MetricFinding {
    metric_name: name.to_string(),
    anomaly_start: first.point.timestamp,
    baseline_avg,
    peak_value,
    change_factor,
    trend: trend(points),
  })
}

/// Direction of the last step in the series.
pub fn trend(points: &[MetricDatapoint]) -> Trend {
  match points {
    [.., prev, last] if last.value > prev.value => Trend::Rising,
    [.., prev, last] if last.value < prev.value => Trend::Recovering,
    [.., _, _] => Trend::Saturated,
    _ => Trend::Stable,
  }
}

/// Largest group of metrics whose anomalies start in the same minute.
///
/// Only reported when at least two metrics share the onset; ties go to the earliest minute.
pub fn shared_onset(findings: &[MetricFinding]) -> Option<OnsetCluster> {
  let mut by_minute: BTreeMap<String, Vec<String>> = BTreeMap::new();
  for f in findings {
    by_minute
      .entry(minute_bucket(&f.anomaly_start))
      .or_default()
      .push(f.metric_name.clone());
  }

  let mut best: Option<(String, Vec<String>)> = None;
  for (minute, metrics) in by_minute {
    let larger = best.as_ref().map_or(true, |(_, m)| metrics.len() > m.len());
    if larger {
      best = Some((minute, metrics));
    }
  }

  best
    .filter(|(_, metrics)| metrics.len() > 1)
    .map(|(minute, metrics)| OnsetCluster { minute, metrics })
}

/// Human-readable account of the anomalous metrics, ending with the shared onset
/// when there is one. `None` when nothing was flagged.
///
/// Latency metrics peaking above `latency_alert_ms` are called out as critical;
/// everything else reports its change factor.
pub fn narrative(
  findings: &[MetricFinding],
  onset: Option<&OnsetCluster>,
  latency_alert_ms: f64,
) -> Option<String> {
  if findings.is_empty() {
    return None;
  }

  let mut parts: Vec<String> = findings
    .iter()
    .map(|f| {
      if f.metric_name.to_lowercase().contains("latency") && f.peak_value > latency_alert_ms {
        format!(
          "Critical: {} spiked to {:.2}ms (threshold {}ms exceeded).",
          f.metric_name, f.peak_value, latency_alert_ms
        )
      } else {
        format!(
          "{} showed a {:.1}x increase compared to baseline.",
          f.metric_name, f.change_factor
        )
      }
    })
    .collect();

  if let Some(cluster) = onset {
    parts.push(format!(
      "Correlation: {} anomalies start at {}.",
      cluster.metrics.len(),
      cluster.minute
    ));
  }
  Some(parts.join(" "))
}
