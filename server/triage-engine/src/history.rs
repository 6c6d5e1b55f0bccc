//! Narrow deploy history to the changes that concern an incident.
//!
//! Relevance is an explicit predicate supplied by the caller; there is no
//! special-cased service name that always passes.

use crate::types::{DeployEvent, TimeWindow};

/// Decides whether a deploy concerns the incident under investigation.
pub trait RelevanceFilter {
  fn is_relevant(&self, deploy: &DeployEvent) -> bool;
}

impl<F> RelevanceFilter for F
where
  F: Fn(&DeployEvent) -> bool,
{
  fn is_relevant(&self, deploy: &DeployEvent) -> bool {
    self(deploy)
  }
}

/// Accepts every deploy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyDeploy;

impl RelevanceFilter for AnyDeploy {
  fn is_relevant(&self, _deploy: &DeployEvent) -> bool {
    true
  }
}

/// Relevant when the deploy belongs to the service, its message/body mentions it,
/// or one of its files lives under a directory named after it.
#[derive(Debug, Clone)]
pub struct MentionsService {
  needle: String,
}

impl MentionsService {
  pub fn new(service: &str) -> Self {
    Self {
      needle: service.trim().to_lowercase(),
    }
  }
}

impl MentionsService {
  /// Paths are already '/'-separated by normalization; the file name itself doesn't count.
  fn names_directory(&self, path: &str) -> bool {
    let mut segments: Vec<&str> = path.split('/').collect();
    segments.pop();
    segments.iter().any(|s| s.to_lowercase() == self.needle)
  }
}

impl RelevanceFilter for MentionsService {
  fn is_relevant(&self, deploy: &DeployEvent) -> bool {
    if self.needle.is_empty() {
      return true;
    }
    deploy.service.to_lowercase() == self.needle
      || deploy.message.to_lowercase().contains(&self.needle)
      || deploy.body.to_lowercase().contains(&self.needle)
      || deploy.affected_files.iter().any(|path| self.names_directory(path))
  }
}

/// Deploys inside `window` (when given) that pass `relevance`, input order kept.
pub fn filter<R: RelevanceFilter + ?Sized>(
  deployments: &[DeployEvent],
  window: Option<&TimeWindow>,
  relevance: &R,
) -> Vec<DeployEvent> {
  deployments
    .iter()
    .filter(|d| window.map_or(true, |w| w.contains(&d.timestamp)))
    .filter(|d| relevance.is_relevant(d))
    .cloned()
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{DateTime, TimeZone, Utc};

  fn at(hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 6, hour, min, 0).unwrap()
  }

  fn deploy(id: &str, service: &str, message: &str, body: &str, ts: DateTime<Utc>) -> DeployEvent {
    DeployEvent {
      id: id.into(),
      timestamp: ts,
      author: "dev".into(),
      message: message.into(),
      body: body.into(),
      affected_files: Default::default(),
      service: service.into(),
    }
  }

  fn window() -> TimeWindow {
    TimeWindow {
      start: at(11, 0),
      end: at(15, 0),
    }
  }

  #[test]
  fn window_bounds_are_inclusive() {
    let deploys = vec![
      deploy("start", "", "x", "", at(11, 0)),
      deploy("end", "", "x", "", at(15, 0)),
      deploy("before", "", "x", "", at(10, 59)),
      deploy("after", "", "x", "", at(15, 1)),
    ];
    let kept = filter(&deploys, Some(&window()), &AnyDeploy);
    let ids: Vec<_> = kept.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["start", "end"]);
  }

  #[test]
  fn service_mentions_are_case_insensitive() {
    let f = MentionsService::new("Checkout-Service");
    assert!(f.is_relevant(&deploy("a", "checkout-service", "tweak", "", at(12, 0))));
    assert!(f.is_relevant(&deploy("b", "", "Fix CHECKOUT-SERVICE pool", "", at(12, 0))));
    assert!(f.is_relevant(&deploy("c", "", "tweak", "touches checkout-service", at(12, 0))));
    assert!(!f.is_relevant(&deploy("d", "payment-service", "tweak", "", at(12, 0))));
  }

  #[test]
  fn service_directory_in_changed_files_counts() {
    let mut d = deploy("m", "", "bump timeouts", "", at(12, 0));
    d.affected_files.insert("services/Checkout-Service/app/config.py".into());
    assert!(MentionsService::new("checkout-service").is_relevant(&d));

    let mut named_file = deploy("n", "", "docs", "", at(12, 0));
    named_file.affected_files.insert("docs/checkout-service".into());
    assert!(!MentionsService::new("checkout-service").is_relevant(&named_file));
  }

  #[test]
  fn no_hidden_bypass_for_any_service_name() {
    // A deploy that never mentions the service is dropped, whatever the service is.
    let unrelated = deploy("u", "", "Add mock data", "Adding S3 mock files.", at(12, 0));
    for service in ["checkout-service", "payment-service", "inventory-service"] {
      assert!(!MentionsService::new(service).is_relevant(&unrelated));
    }
  }

  #[test]
  fn closures_work_as_filters() {
    let deploys = vec![
      deploy("a", "", "feat: x", "", at(12, 0)),
      deploy("b", "", "chore: y", "", at(12, 0)),
    ];
    let only_feat = |d: &DeployEvent| d.message.starts_with("feat");
    let kept = filter(&deploys, None, &only_feat);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, "a");
  }
}
