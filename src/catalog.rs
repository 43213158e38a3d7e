// src/catalog.rs

//! File-backed archive repository and generation catalog.
//!
//! Layout on disk: `<root>/<fco-uuid>/generations.json`, one JSON array of
//! generation records per FCO. The catalog is the persistence half of the
//! engine: [`CatalogRunner`] implements every operation kind against it.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::OperationKind;
use crate::fco::FcoRef;
use crate::ops::{OpContext, OperationPayload, OperationRunner, Outcome, RepositoryTarget};

const CATALOG_FILE: &str = "generations.json";

/// How a generation was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Data read from the live entity.
    Full,
    /// Consolidated from existing generations, no data movement.
    Virtual,
}

/// One archived generation of one FCO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: u32,
    pub mode: GenerationMode,
    pub created_at: DateTime<Utc>,
    pub bytes: u64,
    /// Set by archive-check when the stored data fails validation.
    #[serde(default)]
    pub damaged: bool,
}

/// Repository gate over a directory tree.
#[derive(Debug, Clone)]
pub struct FileRepository {
    name: String,
    root: PathBuf,
    enabled: bool,
}

impl FileRepository {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            enabled,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RepositoryTarget for FileRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn open(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating repository root {}", self.root.display()))?;
        Ok(())
    }
}

/// Per-FCO generation catalog rooted at the repository directory.
#[derive(Debug, Clone)]
pub struct GenerationCatalog {
    root: PathBuf,
}

impl GenerationCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn catalog_path(&self, fco: &FcoRef) -> PathBuf {
        self.root.join(&fco.uuid).join(CATALOG_FILE)
    }

    /// Load the generation list for one FCO. A missing catalog file is an
    /// empty history, not an error.
    pub fn load(&self, fco: &FcoRef) -> anyhow::Result<Vec<GenerationRecord>> {
        let path = self.catalog_path(fco);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let records = serde_json::from_str(&raw)
            .with_context(|| format!("parsing catalog {}", path.display()))?;
        Ok(records)
    }

    pub fn store(&self, fco: &FcoRef, records: &[GenerationRecord]) -> anyhow::Result<()> {
        let path = self.catalog_path(fco);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating catalog dir {}", dir.display()))?;
        }
        let raw = serde_json::to_string_pretty(records).context("serializing catalog")?;
        fs::write(&path, raw).with_context(|| format!("writing catalog {}", path.display()))?;
        Ok(())
    }

    /// Next generation id: ids are monotonic per FCO and never reused, even
    /// after removals.
    pub fn next_id(records: &[GenerationRecord]) -> u32 {
        records.iter().map(|g| g.id + 1).max().unwrap_or(0)
    }
}

/// Catalog-backed implementation of every operation kind.
pub struct CatalogRunner {
    catalog: GenerationCatalog,
}

impl CatalogRunner {
    pub fn new(catalog: GenerationCatalog) -> Self {
        Self { catalog }
    }

    fn backup(&self, target: &FcoRef, ctx: &OpContext) -> anyhow::Result<Outcome> {
        let mut records = self.catalog.load(target)?;
        let id = GenerationCatalog::next_id(&records);
        // Placeholder transport size; a real disk transport reports actual
        // transferred bytes here.
        let bytes = 0u64;
        records.push(GenerationRecord {
            id,
            mode: GenerationMode::Full,
            created_at: Utc::now(),
            bytes,
            damaged: false,
        });
        if !ctx.options.dry_run {
            self.catalog.store(target, &records)?;
        }
        Ok(Outcome::Success(Some(OperationPayload::Backup {
            generation_id: id,
            bytes_transferred: bytes,
        })))
    }

    fn restore(&self, target: &FcoRef, ctx: &OpContext) -> anyhow::Result<Outcome> {
        let records = self.catalog.load(target)?;
        let chosen = match ctx.options.generation {
            Some(wanted) => records.iter().find(|g| g.id == wanted),
            None => records.last(),
        };
        match chosen {
            Some(record) if record.damaged => Ok(Outcome::Failed(format!(
                "generation {} is damaged",
                record.id
            ))),
            Some(record) => Ok(Outcome::Success(Some(OperationPayload::Restore {
                generation_id: record.id,
                bytes_transferred: record.bytes,
            }))),
            None => match ctx.options.generation {
                Some(wanted) => Ok(Outcome::Failed(format!(
                    "generation {wanted} not found for {}",
                    target.label()
                ))),
                None => Ok(Outcome::Failed(format!(
                    "no generations archived for {}",
                    target.label()
                ))),
            },
        }
    }

    fn virtual_backup(&self, target: &FcoRef, ctx: &OpContext) -> anyhow::Result<Outcome> {
        let mut records = self.catalog.load(target)?;
        if records.is_empty() {
            // Nothing to consolidate; not a failure of this entity.
            return Ok(Outcome::Skipped(format!(
                "no generations to consolidate for {}",
                target.label()
            )));
        }
        let consolidated = records.len() as u32;
        let id = GenerationCatalog::next_id(&records);
        let bytes = records.iter().map(|g| g.bytes).sum();
        records.push(GenerationRecord {
            id,
            mode: GenerationMode::Virtual,
            created_at: Utc::now(),
            bytes,
            damaged: false,
        });
        if !ctx.options.dry_run {
            self.catalog.store(target, &records)?;
        }
        Ok(Outcome::Success(Some(OperationPayload::VirtualBackup {
            generation_id: id,
            consolidated,
        })))
    }

    fn archive_check(&self, target: &FcoRef) -> anyhow::Result<Outcome> {
        let records = self.catalog.load(target)?;
        let damaged = records.iter().filter(|g| g.damaged).count();
        if damaged > 0 {
            return Ok(Outcome::Failed(format!(
                "{damaged} of {} generations damaged for {}",
                records.len(),
                target.label()
            )));
        }
        Ok(Outcome::Success(Some(OperationPayload::ArchiveCheck {
            generations: records.len(),
            damaged,
        })))
    }

    fn archive_remove(&self, target: &FcoRef, ctx: &OpContext) -> anyhow::Result<Outcome> {
        let records = self.catalog.load(target)?;
        let keep = ctx.options.keep_generations.unwrap_or(0) as usize;
        let excess = records.len().saturating_sub(keep);
        let removed: Vec<u32> = records.iter().take(excess).map(|g| g.id).collect();
        if !ctx.options.dry_run && !removed.is_empty() {
            let kept: Vec<GenerationRecord> = records.into_iter().skip(excess).collect();
            self.catalog.store(target, &kept)?;
        }
        Ok(Outcome::Success(Some(OperationPayload::ArchiveRemove {
            removed,
        })))
    }

    fn show(&self, target: &FcoRef) -> anyhow::Result<Outcome> {
        let records = self.catalog.load(target)?;
        Ok(Outcome::Success(Some(OperationPayload::Show {
            generation_ids: records.iter().map(|g| g.id).collect(),
        })))
    }

    fn status(&self, target: &FcoRef) -> anyhow::Result<Outcome> {
        let records = self.catalog.load(target)?;
        Ok(Outcome::Success(Some(OperationPayload::Status {
            generations: records.len(),
            latest: records.last().map(|g| g.id),
        })))
    }
}

impl OperationRunner for CatalogRunner {
    fn perform(&self, target: &FcoRef, ctx: &OpContext) -> anyhow::Result<Outcome> {
        if ctx.abort.is_triggered() {
            return Ok(Outcome::Aborted);
        }
        match ctx.kind {
            OperationKind::Backup => self.backup(target, ctx),
            OperationKind::Restore => self.restore(target, ctx),
            OperationKind::VirtualBackup => self.virtual_backup(target, ctx),
            OperationKind::ArchiveCheck => self.archive_check(target),
            OperationKind::ArchiveRemove => self.archive_remove(target, ctx),
            OperationKind::Show => self.show(target),
            OperationKind::Status => self.status(target),
        }
    }
}
