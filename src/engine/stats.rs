use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::engine::collection::ResultActionLog;
use crate::engine::state::OperationState;
use crate::fco::EntityType;

/// Terminal-state tallies for one slice of a finished collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub aborted: usize,
}

impl StateCounts {
    fn bump(&mut self, state: OperationState) {
        match state {
            OperationState::Success => self.success += 1,
            OperationState::Failed => self.failed += 1,
            OperationState::Skipped => self.skipped += 1,
            OperationState::Aborted => self.aborted += 1,
            OperationState::Pending | OperationState::Running => {}
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.failed + self.skipped + self.aborted
    }

    pub fn all_clean(&self) -> bool {
        self.failed == 0 && self.aborted == 0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("collection has {pending} result action(s) not yet done")]
    Incomplete { pending: usize },
}

/// Derived aggregate over a finished result-action collection.
///
/// Pure and idempotent: recomputing over the same finished log yields an
/// identical summary. Never computed over a log containing entries that
/// have not reached `done()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticSummary {
    pub total: usize,
    pub overall: StateCounts,
    pub by_entity: BTreeMap<EntityType, StateCounts>,
}

impl StatisticSummary {
    pub fn collect(log: &ResultActionLog) -> Result<Self, StatsError> {
        let snapshots = log.snapshots();
        let pending = snapshots.iter().filter(|s| !s.done).count();
        if pending > 0 {
            return Err(StatsError::Incomplete { pending });
        }

        let mut overall = StateCounts::default();
        let mut by_entity: BTreeMap<EntityType, StateCounts> = BTreeMap::new();
        for snap in &snapshots {
            overall.bump(snap.state);
            by_entity
                .entry(snap.target.entity_type)
                .or_default()
                .bump(snap.state);
        }

        Ok(Self {
            total: snapshots.len(),
            overall,
            by_entity,
        })
    }
}
