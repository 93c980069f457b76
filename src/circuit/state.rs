//! Failure records, the rolling failure window and the circuit state enum.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::{BreakerError, BreakerResult};

/// Breaker state of a single resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Failures are being counted.
    #[default]
    Closed,
    /// The circuit has tripped; failures are ignored until it is closed again.
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
        }
    }
}

/// One reported failure of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    /// Unique per report. Reusing an id overwrites the earlier entry.
    pub request_id: String,
    /// Reporter instance that observed the failure.
    pub instance_id: String,
    /// Event time of the failure.
    pub failure_time: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(
        request_id: impl Into<String>,
        instance_id: impl Into<String>,
        failure_time: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            instance_id: instance_id.into(),
            failure_time,
        }
    }

    /// Reject records with blank identifiers.
    pub fn validate(&self) -> BreakerResult<()> {
        if self.request_id.trim().is_empty() {
            return Err(BreakerError::validation("requestId must not be empty"));
        }
        if self.instance_id.trim().is_empty() {
            return Err(BreakerError::validation("instanceId must not be empty"));
        }
        Ok(())
    }
}

/// Recent failures keyed by request id, pruned by event time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureWindow {
    entries: BTreeMap<String, FailureRecord>,
}

impl FailureWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `record.request_id`.
    pub fn insert(&mut self, record: FailureRecord) {
        self.entries.insert(record.request_id.clone(), record);
    }

    /// Drop every entry whose failure time is strictly before `cutoff`.
    ///
    /// Returns the number of dropped entries.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, r| r.failure_time >= cutoff);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.entries.contains_key(request_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FailureRecord> {
        self.entries.values()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// `latest - window`, saturating at the earliest representable instant.
pub fn window_cutoff(latest: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|w| latest.checked_sub_signed(w))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_record_validation() {
        assert!(FailureRecord::new("r1", "i1", at(0)).validate().is_ok());
        assert!(FailureRecord::new("", "i1", at(0)).validate().is_err());
        assert!(FailureRecord::new("r1", "  ", at(0)).validate().is_err());
    }

    #[test]
    fn test_duplicate_request_id_overwrites() {
        let mut window = FailureWindow::new();
        window.insert(FailureRecord::new("r1", "i1", at(0)));
        window.insert(FailureRecord::new("r1", "i2", at(5)));

        assert_eq!(window.len(), 1);
        let entry = window.iter().next().unwrap();
        assert_eq!(entry.instance_id, "i2");
        assert_eq!(entry.failure_time, at(5));
    }

    #[test]
    fn test_prune_keeps_cutoff_boundary() {
        let mut window = FailureWindow::new();
        for (id, t) in [("a", 0), ("b", 10), ("c", 20)] {
            window.insert(FailureRecord::new(id, "i", at(t)));
        }

        let dropped = window.prune_before(at(10));
        assert_eq!(dropped, 1);
        assert!(!window.contains("a"));
        assert!(window.contains("b"));
        assert!(window.contains("c"));
    }

    #[test]
    fn test_window_cutoff() {
        assert_eq!(window_cutoff(at(40), Duration::from_secs(30)), at(10));
        assert_eq!(
            window_cutoff(at(0), Duration::MAX),
            DateTime::<Utc>::MIN_UTC
        );
    }
}
