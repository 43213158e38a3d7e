// src/ops.rs

//! Collaborator contracts consumed by the orchestration engine.
//!
//! The engine treats these as opaque: operation logic (hypervisor calls,
//! disk transport, catalog IO) lives behind [`OperationRunner`], repository
//! gating behind [`RepositoryTarget`]. Per-entity flow control comes back as
//! an [`Outcome`] variant, never as a special-cased error type.

use serde::{Deserialize, Serialize};

use crate::abort::AbortSignal;
use crate::engine::OperationKind;
use crate::fco::FcoRef;

/// Tagged result of one delegated operation call.
///
/// `Failed`/`Skipped` carry the human-readable reason recorded on the
/// result action. Unexpected errors are returned as `Err` from
/// [`OperationRunner::perform`] instead and are converted to `Failed` at
/// the runnable-command boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Option<OperationPayload>),
    Failed(String),
    Skipped(String),
    Aborted,
}

/// Operation-specific payload attached to a successful result action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum OperationPayload {
    Backup {
        generation_id: u32,
        bytes_transferred: u64,
    },
    Restore {
        generation_id: u32,
        bytes_transferred: u64,
    },
    VirtualBackup {
        generation_id: u32,
        consolidated: u32,
    },
    ArchiveCheck {
        generations: usize,
        damaged: usize,
    },
    ArchiveRemove {
        removed: Vec<u32>,
    },
    Show {
        generation_ids: Vec<u32>,
    },
    Status {
        generations: usize,
        latest: Option<u32>,
    },
}

/// Options forwarded to the delegated operation, merged from `config.yaml`
/// and CLI/API overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationOptions {
    /// Generation to restore; latest when unset.
    #[serde(default)]
    pub generation: Option<u32>,

    /// Retention count for archive-remove.
    #[serde(default)]
    pub keep_generations: Option<u32>,

    /// Report what would be removed without touching the archive.
    #[serde(default)]
    pub dry_run: bool,
}

/// Per-invocation context handed to every delegated operation call.
#[derive(Clone)]
pub struct OpContext {
    pub kind: OperationKind,
    pub options: OperationOptions,
    pub abort: AbortSignal,
}

/// Delegated operation logic: one call per FCO.
///
/// Implementations run on a blocking worker; they may block on network or
/// disk IO and should poll `ctx.abort` at natural checkpoints.
pub trait OperationRunner: Send + Sync {
    fn perform(&self, target: &FcoRef, ctx: &OpContext) -> anyhow::Result<Outcome>;
}

/// Repository/catalog gate checked once per command, before any result
/// action is created.
pub trait RepositoryTarget: Send + Sync {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    /// Prepare the repository for use (create directories, open handles).
    fn open(&self) -> anyhow::Result<()>;
}
