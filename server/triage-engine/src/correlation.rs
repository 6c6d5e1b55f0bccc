//! Correlate an incident to recent deploys/commits.
//!
//! Scoring is additive and inspectable: time proximity (deploys before the incident
//! only) + risky-keyword relevance + a base prior for labeled changes, capped and
//! rounded. Every weight comes from `CorrelationWeights`.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::CorrelationWeights;
use crate::types::{Correlation, CorrelationRecord, DeployEvent};

/// Score and rank deploys against the incident onset.
///
/// `ranked` is sorted by score descending; equal scores keep their input order.
pub fn correlate(
  deployments: &[DeployEvent],
  incident_time: &DateTime<Utc>,
  extra_keywords: &[String],
  weights: &CorrelationWeights,
) -> Correlation {
  if deployments.is_empty() {
    return Correlation::default();
  }

  let vocabulary = vocabulary(&weights.risk_keywords, extra_keywords);

  let mut ranked: Vec<CorrelationRecord> = deployments
    .iter()
    .map(|deploy| score_deploy(deploy, incident_time, &vocabulary, weights))
    .collect();

  // Vec::sort_by is stable, which is what keeps ties in input order.
  ranked.sort_by(|a, b| {
    b.score
      .partial_cmp(&a.score)
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  if let Some(top) = ranked.first() {
    debug!(
      deploys = ranked.len(),
      top_id = %top.deploy.id,
      top_score = top.score,
      "deploy correlation complete"
    );
  }

  Correlation {
    top: ranked.first().cloned(),
    ranked,
  }
}

/// Score a single deploy.
pub fn score_deploy(
  deploy: &DeployEvent,
  incident_time: &DateTime<Utc>,
  vocabulary: &[String],
  weights: &CorrelationWeights,
) -> CorrelationRecord {
  let minutes = minutes_before(&deploy.timestamp, incident_time);
  let message = deploy.message.to_lowercase();

  let matched_keywords: Vec<String> = vocabulary
    .iter()
    .filter(|k| message.contains(k.as_str()))
    .cloned()
    .collect();
  let relevance = if matched_keywords.is_empty() {
    0.0
  } else {
    weights.relevance_score
  };

  let labeled = weights
    .label_keywords
    .iter()
    .any(|k| !k.is_empty() && message.contains(&k.to_lowercase()));
  let base = if labeled {
    weights.labeled_base
  } else {
    weights.unlabeled_base
  };

  let total = (proximity_score(minutes, weights) + relevance + base).min(weights.max_score);

  CorrelationRecord {
    deploy: deploy.clone(),
    score: round_to(total, 2),
    minutes_before_incident: round_to(minutes, 1),
    matched_keywords,
  }
}

/// Score for a deploy `minutes` before the incident: the tightest tier that still
/// covers it. Deploys after the incident (negative minutes) earn nothing.
pub fn proximity_score(minutes: f64, weights: &CorrelationWeights) -> f64 {
  if minutes < 0.0 {
    return 0.0;
  }
  weights
    .proximity_tiers
    .iter()
    .filter(|tier| minutes <= tier.max_minutes)
    .min_by(|a, b| {
      a.max_minutes
        .partial_cmp(&b.max_minutes)
        .unwrap_or(std::cmp::Ordering::Equal)
    })
    .map(|tier| tier.score)
    .unwrap_or(0.0)
}

/// Risk vocabulary plus caller keywords: case-folded, empty and duplicate terms dropped.
fn vocabulary(base: &[String], extra: &[String]) -> Vec<String> {
  let mut out: Vec<String> = Vec::with_capacity(base.len() + extra.len());
  for k in base.iter().chain(extra) {
    let k = k.trim().to_lowercase();
    if !k.is_empty() && !out.contains(&k) {
      out.push(k);
    }
  }
  out
}

fn minutes_before(deploy_time: &DateTime<Utc>, incident_time: &DateTime<Utc>) -> f64 {
  (*incident_time - *deploy_time).num_milliseconds() as f64 / 60_000.0
}

fn round_to(value: f64, decimals: i32) -> f64 {
  let factor = 10f64.powi(decimals);
  (value * factor).round() / factor
}
