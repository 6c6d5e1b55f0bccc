//! Outlier detection over a single metric series.
//!
//! The baseline mean is taken over the points that were *not* flagged, so a spike
//! does not drag the reference level it is compared against.

use tracing::debug;

use crate::types::{Anomaly, AnomalyReport, Baseline, DetectionMethod, MetricDatapoint};

/// Flag anomalous datapoints and compute a baseline.
///
/// - `ZScore`: anomalous iff `|value - mean| / stddev > threshold`, using the
///   Bessel-corrected sample stddev. A zero stddev yields z = 0 for every point.
/// - `Static`: anomalous iff `value > threshold`; no baseline.
///
/// Empty input yields a zero baseline. A single point under `ZScore` is its own
/// baseline and never anomalous.
pub fn detect(points: &[MetricDatapoint], method: DetectionMethod, threshold: f64) -> AnomalyReport {
  if points.is_empty() {
    return AnomalyReport {
      anomalies: Vec::new(),
      baseline: Some(Baseline {
        baseline_mean: 0.0,
        baseline_stddev: 0.0,
      }),
    };
  }

  let report = match method {
    DetectionMethod::ZScore => zscore(points, threshold),
    DetectionMethod::Static => AnomalyReport {
      anomalies: points
        .iter()
        .filter(|p| p.value > threshold)
        .map(|p| Anomaly {
          point: *p,
          z_score: None,
        })
        .collect(),
      baseline: None,
    },
  };

  debug!(
    points = points.len(),
    anomalies = report.anomalies.len(),
    ?method,
    threshold,
    "anomaly detection complete"
  );
  report
}

fn zscore(points: &[MetricDatapoint], threshold: f64) -> AnomalyReport {
  if points.len() < 2 {
    return AnomalyReport {
      anomalies: Vec::new(),
      baseline: Some(Baseline {
        baseline_mean: points[0].value,
        baseline_stddev: 0.0,
      }),
    };
  }

  let values: Vec<f64> = points.iter().map(|p| p.value).collect();

  // Identical values: rounding in the mean must not manufacture a spread.
  if values.windows(2).all(|w| w[0] == w[1]) {
    return AnomalyReport {
      anomalies: Vec::new(),
      baseline: Some(Baseline {
        baseline_mean: values[0],
        baseline_stddev: 0.0,
      }),
    };
  }

  let overall = mean(&values);
  let stddev = sample_stddev(&values, overall);

  let mut anomalies = Vec::new();
  let mut normal = Vec::with_capacity(values.len());
  for p in points {
    let z = if stddev > 0.0 { (p.value - overall) / stddev } else { 0.0 };
    if z.abs() > threshold {
      anomalies.push(Anomaly {
        point: *p,
        z_score: Some(z),
      });
    } else {
      normal.push(p.value);
    }
  }

  // Everything flagged: fall back to the overall mean.
  let baseline_mean = if normal.is_empty() { overall } else { mean(&normal) };

  AnomalyReport {
    anomalies,
    baseline: Some(Baseline {
      baseline_mean,
      baseline_stddev: stddev,
    }),
  }
}

fn mean(values: &[f64]) -> f64 {
  values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1). Callers guarantee `values.len() >= 2`.
fn sample_stddev(values: &[f64], mean: f64) -> f64 {
  let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
  (sum_sq / (values.len() - 1) as f64).sqrt()
}
