//! Property-based tests for the scoring and envelope invariants.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use triage_engine::anomaly;
use triage_engine::config::CorrelationWeights;
use triage_engine::correlation;
use triage_engine::envelope::{self, Timing};
use triage_engine::stack;
use triage_engine::types::{
  DeployEvent, DetectionMethod, EnvelopeStatus, Finding, MetricDatapoint, MetricFinding, Trend,
};

fn incident() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 2, 6, 14, 45, 0).unwrap()
}

fn deploy(message: &str, offset_secs: i64) -> DeployEvent {
  DeployEvent {
    id: "d".into(),
    timestamp: incident() - Duration::seconds(offset_secs),
    author: "dev".into(),
    message: message.into(),
    body: String::new(),
    affected_files: Default::default(),
    service: "svc".into(),
  }
}

fn score(message: &str, offset_secs: i64) -> f64 {
  correlation::correlate(
    &[deploy(message, offset_secs)],
    &incident(),
    &[],
    &CorrelationWeights::default(),
  )
  .ranked[0]
    .score
}

fn series(values: &[f64]) -> Vec<MetricDatapoint> {
  let start = incident();
  values
    .iter()
    .enumerate()
    .map(|(i, v)| MetricDatapoint {
      timestamp: start + Duration::minutes(i as i64),
      value: *v,
    })
    .collect()
}

fn metric_finding() -> Finding {
  Finding::Metric(MetricFinding {
    metric_name: "m".into(),
    anomaly_start: incident(),
    baseline_avg: 1.0,
    peak_value: 2.0,
    change_factor: 2.0,
    trend: Trend::Stable,
  })
}

// Commit messages built from a mix of risky, labeled, and neutral words.
prop_compose! {
  fn arb_message()(words in prop::collection::vec(
    prop::sample::select(vec!["config", "pool", "fix", "feat", "docs", "typo", "DB", "readme", "Timeout", "bump"]),
    0..6,
  )) -> String {
    words.join(" ")
  }
}

proptest! {
  #[test]
  fn constant_series_never_anomalous(
    value in -1.0e6f64..1.0e6,
    len in 0usize..50,
    threshold in 0.001f64..10.0,
  ) {
    let report = anomaly::detect(&series(&vec![value; len]), DetectionMethod::ZScore, threshold);
    prop_assert!(report.anomalies.is_empty());
  }

  #[test]
  fn baseline_stddev_is_non_negative(values in prop::collection::vec(-1.0e6f64..1.0e6, 0..40)) {
    let report = anomaly::detect(&series(&values), DetectionMethod::ZScore, 2.0);
    let b = report.baseline.unwrap();
    prop_assert!(b.baseline_stddev >= 0.0);
  }

  #[test]
  fn flagged_points_exceed_threshold(
    values in prop::collection::vec(-1.0e3f64..1.0e3, 2..40),
    threshold in 0.1f64..4.0,
  ) {
    let report = anomaly::detect(&series(&values), DetectionMethod::ZScore, threshold);
    for a in &report.anomalies {
      prop_assert!(a.z_score.unwrap().abs() > threshold);
    }
  }

  #[test]
  fn proximity_is_monotonic_before_incident(
    message in arb_message(),
    near in 0i64..7200,
    gap in 0i64..7200,
  ) {
    let closer = score(&message, near);
    let farther = score(&message, near + gap);
    prop_assert!(closer >= farther);
  }

  #[test]
  fn deploys_after_incident_get_no_proximity(message in arb_message(), after in 1i64..86_400) {
    prop_assert_eq!(correlation::proximity_score(-(after as f64) / 60.0, &CorrelationWeights::default()), 0.0);
    // Whatever the message, a late deploy scores at most relevance + labeled base.
    prop_assert!(score(&message, -after) <= 0.6);
  }

  #[test]
  fn scores_are_bounded_and_ranked(
    messages in prop::collection::vec(arb_message(), 0..8),
    offsets in prop::collection::vec(-3600i64..7200, 8),
  ) {
    let deploys: Vec<DeployEvent> = messages
      .iter()
      .zip(&offsets)
      .map(|(m, o)| deploy(m, *o))
      .collect();
    let c = correlation::correlate(&deploys, &incident(), &[], &CorrelationWeights::default());

    prop_assert_eq!(c.ranked.len(), deploys.len());
    for r in &c.ranked {
      prop_assert!((0.0..=1.0).contains(&r.score));
    }
    for pair in c.ranked.windows(2) {
      prop_assert!(pair[0].score >= pair[1].score);
    }
    prop_assert_eq!(c.top.as_ref(), c.ranked.first());
  }

  #[test]
  fn error_always_fails_and_summary_always_wins(
    error in prop::option::of("[a-zA-Z ]{0,20}"),
    summary in prop::option::of(".{0,30}"),
    n in 0usize..4,
  ) {
    let findings: Vec<Finding> = (0..n).map(|_| metric_finding()).collect();
    let timing = Timing::new(incident(), incident());
    let env = envelope::build("a", "i", findings, timing, error.clone(), summary.clone());

    if error.is_some() {
      prop_assert_eq!(env.status, EnvelopeStatus::Failed);
    }
    if let Some(s) = summary {
      prop_assert_eq!(env.summary, s);
    }
    prop_assert_eq!(env.metadata.findings_count as usize, n);
  }

  #[test]
  fn extract_never_panics_and_depth_bounds_chain(raw in ".{0,200}") {
    if let Some(parsed) = stack::extract(Some(raw.as_str())) {
      prop_assert!(parsed.call_chain.len() <= stack::CALL_CHAIN_LIMIT);
      prop_assert!(parsed.depth as usize >= parsed.call_chain.len());
      prop_assert_eq!(&parsed.call_chain[0], &parsed.root_frame.qualified_name);
    }
  }
}
