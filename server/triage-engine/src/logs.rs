//! Error-code tallies and parsed stack samples over one batch of log records.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::config::LogConfig;
use crate::fingerprint;
use crate::stack;
use crate::types::{ErrorTally, LogFindings, LogRecord, LogSample};

/// Summarize a batch of log records.
///
/// - Counts records per error code; first/last seen follow input order.
/// - Samples up to `sample_limit` records whose stack trace parses, one per
///   distinct stack signature.
pub fn summarize(records: &[LogRecord], config: &LogConfig) -> LogFindings {
  let mut error_summary: BTreeMap<String, ErrorTally> = BTreeMap::new();
  let mut sample_entries: Vec<LogSample> = Vec::new();
  let mut seen_signatures: HashSet<String> = HashSet::new();

  for record in records {
    let code = record
      .error_code
      .clone()
      .unwrap_or_else(|| config.default_error_code.clone());
    let tally = error_summary.entry(code).or_insert_with(|| ErrorTally {
      count: 0,
      first_seen: record.timestamp,
      last_seen: record.timestamp,
    });
    tally.count += 1;
    tally.last_seen = record.timestamp;

    if sample_entries.len() >= config.sample_limit {
      continue;
    }
    let Some(parsed_stack) = stack::extract(record.stack_trace.as_deref()) else {
      continue;
    };
    let signature = fingerprint::stack_signature(&parsed_stack);
    if seen_signatures.insert(signature.clone()) {
      sample_entries.push(LogSample {
        record: record.clone(),
        parsed_stack,
        signature,
      });
    }
  }

  debug!(
    records = records.len(),
    codes = error_summary.len(),
    samples = sample_entries.len(),
    "log summary complete"
  );

  LogFindings {
    matched_entries: records.len(),
    error_summary,
    sample_entries,
  }
}

impl LogFindings {
  /// Up to `n` error codes by count descending, ties by code.
  pub fn top_errors(&self, n: usize) -> Vec<(&str, u64)> {
    let mut codes: Vec<(&str, u64)> = self
      .error_summary
      .iter()
      .map(|(code, tally)| (code.as_str(), tally.count))
      .collect();
    // BTreeMap iteration is already sorted by code; the stable sort keeps that on ties.
    codes.sort_by(|a, b| b.1.cmp(&a.1));
    codes.truncate(n);
    codes
  }

  /// "Detected N error logs. Top issues: 2x A, 1x B." `None` for an empty batch.
  pub fn narrative(&self) -> Option<String> {
    if self.matched_entries == 0 {
      return None;
    }
    let issues: Vec<String> = self
      .top_errors(2)
      .into_iter()
      .map(|(code, count)| format!("{}x {}", count, code))
      .collect();
    Some(format!(
      "Detected {} error logs. Top issues: {}.",
      self.matched_entries,
      issues.join(", ")
    ))
  }
}
