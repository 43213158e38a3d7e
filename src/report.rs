// src/report.rs

//! Human-readable rendering of a finished command.
//!
//! One line per result action, then the statistics roll-up. The exit-code
//! policy lives here too: anything Failed or Aborted makes the invocation
//! non-zero.

use std::fmt::Write as _;
use std::io::IsTerminal;

use crate::engine::run::CommandReport;
use crate::engine::state::OperationState;
use crate::ops::OperationPayload;

pub fn render(report: &CommandReport) -> String {
    render_with_color(report, should_use_color())
}

fn render_with_color(report: &CommandReport, use_color: bool) -> String {
    let mut out = String::new();

    let state = paint_state(report.state, use_color);
    let _ = writeln!(out, "{} {}", state, report.kind);
    if let Some(reason) = &report.reason {
        let _ = writeln!(out, "reason: {reason}");
    }

    for snap in report.log.snapshots() {
        let state = paint_state(snap.state, use_color);
        let mut line = format!("  {} {}", state, snap.target.label());
        if let Some(payload) = &snap.payload {
            let _ = write!(line, "  {}", describe_payload(payload));
        }
        if let Some(reason) = &snap.reason {
            if snap.state != OperationState::Success {
                let _ = write!(line, "  ({reason})");
            }
        }
        let _ = writeln!(out, "{line}");
    }

    if let Some(stats) = &report.stats {
        let _ = writeln!(
            out,
            "total: {}  success: {}  failed: {}  skipped: {}  aborted: {}",
            stats.total,
            stats.overall.success,
            stats.overall.failed,
            stats.overall.skipped,
            stats.overall.aborted,
        );
        for (entity, counts) in &stats.by_entity {
            let _ = writeln!(
                out,
                "  {entity}: {} success, {} failed, {} skipped, {} aborted",
                counts.success, counts.failed, counts.skipped, counts.aborted,
            );
        }
    }

    out.trim_end().to_string()
}

fn describe_payload(payload: &OperationPayload) -> String {
    match payload {
        OperationPayload::Backup {
            generation_id,
            bytes_transferred,
        } => format!("generation {generation_id}, {bytes_transferred} bytes"),
        OperationPayload::Restore {
            generation_id,
            bytes_transferred,
        } => format!("restored generation {generation_id}, {bytes_transferred} bytes"),
        OperationPayload::VirtualBackup {
            generation_id,
            consolidated,
        } => format!("generation {generation_id}, consolidated {consolidated}"),
        OperationPayload::ArchiveCheck {
            generations,
            damaged,
        } => format!("{generations} generations, {damaged} damaged"),
        OperationPayload::ArchiveRemove { removed } => {
            if removed.is_empty() {
                "nothing to remove".to_string()
            } else {
                format!(
                    "removed {}",
                    removed
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        }
        OperationPayload::Show { generation_ids } => {
            if generation_ids.is_empty() {
                "no generations".to_string()
            } else {
                format!(
                    "generations {}",
                    generation_ids
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        }
        OperationPayload::Status {
            generations,
            latest,
        } => match latest {
            Some(latest) => format!("{generations} generations, latest {latest}"),
            None => "empty archive".to_string(),
        },
    }
}

fn paint_state(state: OperationState, use_color: bool) -> String {
    let (text, color) = match state {
        OperationState::Success => ("OK", "32"),
        OperationState::Failed => ("FAIL", "31"),
        OperationState::Skipped => ("SKIP", "33"),
        OperationState::Aborted => ("ABRT", "35"),
        OperationState::Running => ("RUN", "36"),
        OperationState::Pending => ("PEND", "37"),
    };
    paint(text, color, use_color)
}

fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[{}m{}\x1b[0m", color, text)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::AbortSignal;
    use crate::engine::run::{run_sync, Collaborators, CommandContext};
    use crate::engine::OperationKind;
    use crate::fco::{EntityType, FcoRef, InventoryResolver, TargetFilter};
    use crate::ops::{OpContext, OperationOptions, OperationRunner, Outcome, RepositoryTarget};
    use crate::sinks::collecting::CollectingSink;
    use std::sync::Arc;

    struct AlwaysOk;
    impl OperationRunner for AlwaysOk {
        fn perform(&self, _t: &FcoRef, _c: &OpContext) -> anyhow::Result<Outcome> {
            Ok(Outcome::Success(Some(OperationPayload::Backup {
                generation_id: 0,
                bytes_transferred: 0,
            })))
        }
    }

    struct Repo;
    impl RepositoryTarget for Repo {
        fn name(&self) -> &str {
            "r"
        }
        fn is_enabled(&self) -> bool {
            true
        }
        fn open(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn renders_actions_and_totals() {
        let deps = Collaborators {
            resolver: Arc::new(InventoryResolver::new(vec![FcoRef {
                uuid: "u1".into(),
                name: "web-01".into(),
                entity_type: EntityType::VirtualMachine,
                tags: vec![],
            }])),
            runner: Arc::new(AlwaysOk),
            repository: Arc::new(Repo),
            sink: Arc::new(CollectingSink::new()),
        };
        let report = run_sync(
            CommandContext {
                kind: OperationKind::Backup,
                filter: TargetFilter {
                    all: true,
                    ..Default::default()
                },
                options: OperationOptions::default(),
                abort: AbortSignal::new(),
            },
            &deps,
        )
        .await;

        let rendered = render_with_color(&report, false);
        assert!(rendered.starts_with("OK backup"));
        assert!(rendered.contains("vm:web-01"));
        assert!(rendered.contains("generation 0"));
        assert!(rendered.contains("total: 1  success: 1"));
    }

    #[test]
    fn paint_respects_flag() {
        assert_eq!(paint("OK", "32", false), "OK");
        assert_eq!(paint("OK", "32", true), "\x1b[32mOK\x1b[0m");
    }
}
