use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod action;
pub mod collection;
pub mod events;
pub mod run;
pub mod sink;
pub mod state;
pub mod stats;

pub use action::{ActionId, ActionSnapshot, ResultAction};
pub use collection::ResultActionLog;
pub use state::OperationState;
pub use stats::StatisticSummary;

/* ---------------- operation kinds ---------------- */

/// Every data-protection operation the engine can fan out.
///
/// One generic result action is parameterized by this tag (plus an
/// operation payload); there is no per-kind result hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Backup,
    Restore,
    VirtualBackup,
    ArchiveCheck,
    ArchiveRemove,
    Show,
    Status,
}

/// Worker-pool category an operation is scheduled on.
///
/// Distinct categories keep archive maintenance from starving interactive
/// FCO operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCategory {
    /// Backup / restore / virtual-backup of whole FCOs.
    Fco,
    /// Archive integrity and retention work.
    Archive,
    /// Generation queries (show, status).
    Generation,
}

impl OperationKind {
    pub fn category(&self) -> OpCategory {
        match self {
            OperationKind::Backup | OperationKind::Restore | OperationKind::VirtualBackup => {
                OpCategory::Fco
            }
            OperationKind::ArchiveCheck | OperationKind::ArchiveRemove => OpCategory::Archive,
            OperationKind::Show | OperationKind::Status => OpCategory::Generation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Backup => "backup",
            OperationKind::Restore => "restore",
            OperationKind::VirtualBackup => "virtual-backup",
            OperationKind::ArchiveCheck => "archive-check",
            OperationKind::ArchiveRemove => "archive-remove",
            OperationKind::Show => "show",
            OperationKind::Status => "status",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backup" => Ok(OperationKind::Backup),
            "restore" => Ok(OperationKind::Restore),
            "virtual-backup" => Ok(OperationKind::VirtualBackup),
            "archive-check" => Ok(OperationKind::ArchiveCheck),
            "archive-remove" => Ok(OperationKind::ArchiveRemove),
            "show" => Ok(OperationKind::Show),
            "status" => Ok(OperationKind::Status),
            other => Err(format!("unknown operation: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            OperationKind::Backup,
            OperationKind::Restore,
            OperationKind::VirtualBackup,
            OperationKind::ArchiveCheck,
            OperationKind::ArchiveRemove,
            OperationKind::Show,
            OperationKind::Status,
        ] {
            assert_eq!(kind.as_str().parse::<OperationKind>(), Ok(kind));
        }
    }

    #[test]
    fn archive_kinds_share_the_archive_pool() {
        assert_eq!(OperationKind::ArchiveCheck.category(), OpCategory::Archive);
        assert_eq!(OperationKind::ArchiveRemove.category(), OpCategory::Archive);
        assert_eq!(OperationKind::Backup.category(), OpCategory::Fco);
        assert_eq!(OperationKind::Status.category(), OpCategory::Generation);
    }
}
