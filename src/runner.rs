// src/runner.rs

//! CLI command dispatch.
//!
//! Every operation command runs synchronously against the catalog; `serve`
//! starts the HTTP API instead. Ctrl-C is wired to the abort signal, so an
//! interrupted invocation finishes the in-flight entity, records the rest,
//! and exits with the aborted report.

use crate::abort::AbortSignal;
use crate::catalog::{CatalogRunner, FileRepository, GenerationCatalog};
use crate::cli::{ArchiveCommand, Cli, Command, SelectArgs};
use crate::config::Config;
use crate::engine::run::{run_sync, Collaborators, CommandContext};
use crate::engine::OperationKind;
use crate::ops::OperationOptions;
use crate::report;
use crate::runtime::{self, AppState};
use crate::sinks::trace::TracingSink;

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;

/// Entry point from `main.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init => init_scaffold(),

        Command::Serve { config, addr } => {
            let cfg = Config::load(&config)?;
            let addr = addr.unwrap_or_else(|| cfg.server.bind.clone());
            let state = AppState::from_config(&cfg, collaborators(&cfg));
            runtime::serve(&addr, state).await
        }

        Command::Backup { select } => {
            run_operation(OperationKind::Backup, select, OperationOptions::default()).await
        }

        Command::Restore { select, generation } => {
            run_operation(
                OperationKind::Restore,
                select,
                OperationOptions {
                    generation,
                    ..Default::default()
                },
            )
            .await
        }

        Command::VirtualBackup { select } => {
            run_operation(
                OperationKind::VirtualBackup,
                select,
                OperationOptions::default(),
            )
            .await
        }

        Command::Archive(ArchiveCommand::Check { select }) => {
            run_operation(OperationKind::ArchiveCheck, select, OperationOptions::default()).await
        }

        Command::Archive(ArchiveCommand::Remove {
            select,
            keep,
            dry_run,
        }) => {
            run_operation(
                OperationKind::ArchiveRemove,
                select,
                OperationOptions {
                    keep_generations: keep,
                    dry_run,
                    ..Default::default()
                },
            )
            .await
        }

        Command::Show { select } => {
            run_operation(OperationKind::Show, select, OperationOptions::default()).await
        }

        Command::Status { select } => {
            run_operation(OperationKind::Status, select, OperationOptions::default()).await
        }
    }
}

/* ---------------- synchronous path ---------------- */

async fn run_operation(
    kind: OperationKind,
    select: SelectArgs,
    mut options: OperationOptions,
) -> Result<()> {
    let cfg = Config::load(&select.config)?;

    if kind == OperationKind::ArchiveRemove && options.keep_generations.is_none() {
        options.keep_generations = Some(cfg.options.keep_generations);
    }

    let abort = AbortSignal::new();
    wire_ctrl_c(abort.clone());

    let ctx = CommandContext {
        kind,
        filter: select.filter(),
        options,
        abort,
    };
    let report = run_sync(ctx, &collaborators(&cfg)).await;

    println!("{}", report::render(&report));

    if !report.is_clean() {
        bail!("{} finished {}", report.kind, report.state);
    }
    Ok(())
}

fn collaborators(cfg: &Config) -> Collaborators {
    let repo_path = cfg.repository.path.clone();
    Collaborators {
        resolver: Arc::new(crate::fco::InventoryResolver::new(cfg.inventory.clone())),
        runner: Arc::new(CatalogRunner::new(GenerationCatalog::new(&repo_path))),
        repository: Arc::new(FileRepository::new(
            cfg.repository.name.clone(),
            repo_path,
            cfg.repository.enabled,
        )),
        sink: Arc::new(TracingSink),
    }
}

fn wire_ctrl_c(abort: AbortSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing the in-flight entity");
            abort.trigger();
        }
    });
}

/* ---------------- init scaffold ---------------- */

fn init_scaffold() -> Result<()> {
    if !Path::new("config.yaml").exists() {
        std::fs::write("config.yaml", default_config_yaml())?;
        eprintln!("Created config.yaml");
    } else {
        eprintln!("config.yaml already exists (skipping)");
    }

    if !Path::new("archive").exists() {
        std::fs::create_dir_all("archive")?;
        eprintln!("Created archive/");
    }

    Ok(())
}

pub(crate) fn default_config_yaml() -> &'static str {
    r#"
repository:
  name: archive
  path: archive
  enabled: true

inventory:
  - uuid: "4222f878-0f6d-4c2e-8f3a-1df7c5a5e001"
    name: web-01
    type: vm
    tags: [production]
  - uuid: "4222f878-0f6d-4c2e-8f3a-1df7c5a5e002"
    name: data-disk
    type: ivd
    tags: [production]

pools:
  fco: 4
  archive: 2
  generation: 2

server:
  bind: 127.0.0.1:8974

options:
  keep_generations: 7
"#
}
