//! Fault injection for the in-memory engine
//!
//! Used by tests to simulate a store failing (or a process dying) in the
//! middle of a migration run.

use std::sync::Mutex;

use crate::{StoreError, StoreResult};

/// Operation kinds that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Find,
    Insert,
    Update,
    Replace,
    Delete,
    CreateIndex,
    DropIndex,
    Aggregate,
    Commit,
}

impl std::fmt::Display for FaultPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FaultPoint::Find => "find",
            FaultPoint::Insert => "insert",
            FaultPoint::Update => "update",
            FaultPoint::Replace => "replace",
            FaultPoint::Delete => "delete",
            FaultPoint::CreateIndex => "create_index",
            FaultPoint::DropIndex => "drop_index",
            FaultPoint::Aggregate => "aggregate",
            FaultPoint::Commit => "commit",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
struct FaultRule {
    point: FaultPoint,
    collection: Option<String>,
    /// Matching operations allowed through before the fault fires
    skip: usize,
    /// Failures left to raise once armed
    failures: usize,
}

/// Fails selected operations after a number of successful occurrences
#[derive(Debug, Default)]
pub struct FaultInjector {
    rules: Mutex<Vec<FaultRule>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the occurrence of `point` that follows `skip` successful ones, once
    pub fn fail_after(&self, point: FaultPoint, skip: usize) {
        self.push(FaultRule {
            point,
            collection: None,
            skip,
            failures: 1,
        });
    }

    /// Like [`fail_after`](Self::fail_after) but only for one collection
    pub fn fail_after_on(&self, point: FaultPoint, collection: &str, skip: usize) {
        self.push(FaultRule {
            point,
            collection: Some(collection.to_string()),
            skip,
            failures: 1,
        });
    }

    /// Remove every pending fault
    pub fn clear(&self) {
        self.rules.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Number of faults that have not fired yet
    pub fn pending(&self) -> usize {
        self.rules.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Called by the engine before performing `point` on `collection`
    pub fn check(&self, point: FaultPoint, collection: &str) -> StoreResult<()> {
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        let mut fire = false;
        for rule in rules.iter_mut() {
            if rule.point != point {
                continue;
            }
            if let Some(target) = &rule.collection {
                if target != collection {
                    continue;
                }
            }
            if rule.skip > 0 {
                rule.skip -= 1;
                continue;
            }
            rule.failures -= 1;
            fire = true;
            break;
        }
        rules.retain(|r| r.failures > 0);
        if fire {
            tracing::debug!(%point, collection, "raising injected store fault");
            return Err(StoreError::Injected(format!("{} on {}", point, collection)));
        }
        Ok(())
    }

    fn push(&self, rule: FaultRule) {
        self.rules.lock().unwrap_or_else(|e| e.into_inner()).push(rule);
    }
}
