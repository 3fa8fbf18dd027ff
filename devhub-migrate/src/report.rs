//! Run reports

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::migration::{Direction, TransformOutcome};

/// Result of one completed step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub version: i64,
    pub description: String,
    pub direction: Direction,
    pub outcome: TransformOutcome,
    pub duration_ms: u64,
}

/// Result of an `apply_up` / `apply_down` run that finished without error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    pub from_version: i64,
    pub to_version: i64,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_duration_ms: u64,
}

impl RunReport {
    pub fn new(direction: Direction, from_version: i64, tenant: Option<String>) -> Self {
        Self {
            direction,
            tenant,
            from_version,
            to_version: from_version,
            steps: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            total_duration_ms: 0,
        }
    }

    pub fn push(&mut self, step: StepReport, to_version: i64) {
        self.steps.push(step);
        self.to_version = to_version;
    }

    pub fn complete(&mut self) {
        let completed_at = Utc::now();
        self.total_duration_ms = completed_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self.completed_at = Some(completed_at);
    }

    /// Versions whose transform ran
    pub fn applied_versions(&self) -> Vec<i64> {
        self.steps
            .iter()
            .filter(|s| s.outcome == TransformOutcome::Applied)
            .map(|s| s.version)
            .collect()
    }

    /// Steps recorded as done without running (not applicable or irreversible)
    pub fn skipped_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.outcome != TransformOutcome::Applied)
            .count()
    }

    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(version: i64, outcome: TransformOutcome) -> StepReport {
        StepReport {
            version,
            description: format!("step {}", version),
            direction: Direction::Up,
            outcome,
            duration_ms: 1,
        }
    }

    #[test]
    fn test_run_report() {
        let mut report = RunReport::new(Direction::Up, 2, None);
        assert!(report.is_noop());

        report.push(step(3, TransformOutcome::Applied), 3);
        report.push(step(6, TransformOutcome::not_applicable("community")), 6);
        report.complete();

        assert_eq!(report.from_version, 2);
        assert_eq!(report.to_version, 6);
        assert_eq!(report.applied_versions(), vec![3]);
        assert_eq!(report.skipped_count(), 1);
        assert!(report.completed_at.is_some());
    }
}
