//! Lifecycle commands - install, activate, update, status

use super::{new_worker, open_store, resumed_worker};
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::config::{Config, ConfigManager};
use crate::error::ShelfResult;
use crate::preload::InstallSummary;
use crate::resolve::Scheme;
use crate::store::PartitionStore;
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::{LifecycleRecord, ReclaimOutcome, Worker, WorkerState};
use console::style;
use serde::Serialize;

/// Preload every declared partition
pub async fn install(config: &Config) -> ShelfResult<()> {
    let ctx = UiContext::detect();
    let (worker, dir) = new_worker(config).await?;
    let previous = LifecycleRecord::load(&dir).await?;

    ui::intro(&ctx, "shelf install");
    let result = run_install(&ctx, &worker).await;
    let (outcome, partitions) = match &result {
        Ok(summary) => (
            WorkerState::Installed,
            summary.partitions.iter().map(|(p, _)| p.clone()).collect(),
        ),
        Err(_) => (WorkerState::Redundant, vec![]),
    };

    // A serving generation keeps serving; the install waits for `activate`
    let record = match previous {
        Some(serving) if serving.is_serving() => serving.with_pending(outcome, partitions),
        _ => {
            let mut record = LifecycleRecord::new(outcome, worker.scheme().to_string());
            record.partitions = partitions;
            record
        }
    };
    record.save(&dir).await?;
    result?;

    ui::outro_success(&ctx, "Installed. Run `shelf activate` to start serving");
    Ok(())
}

async fn run_install(ctx: &UiContext, worker: &Worker) -> ShelfResult<InstallSummary> {
    let mut spinner = TaskSpinner::new(ctx);
    spinner.start(&format!("Preloading partitions ({})...", worker.scheme()));

    match worker.install().await {
        Ok(summary) => {
            spinner.stop(&format!(
                "Preloaded {} resources into {} partitions",
                summary.total(),
                summary.partitions.len()
            ));
            for (partition, count) in &summary.partitions {
                ui::step_ok_detail(ctx, partition, &format!("{} entries", count));
            }
            Ok(summary)
        }
        Err(e) => {
            spinner.stop_error("Preload failed; nothing was committed");
            Err(e)
        }
    }
}

/// Reclaim stale partitions and mark the installed generation as serving
pub async fn activate(config: &Config) -> ShelfResult<()> {
    let ctx = UiContext::detect();
    let (worker, record, dir) = resumed_worker(config, LifecycleRecord::activation_state).await?;

    ui::intro(&ctx, "shelf activate");
    let clean = run_activate(&ctx, &worker).await?;

    let mut activated = LifecycleRecord::new(WorkerState::Activated, worker.scheme().to_string());
    activated.partitions = record.map(|r| r.partitions).unwrap_or_default();
    activated.save(&dir).await?;

    if clean {
        ui::outro_success(&ctx, "Activated");
    } else {
        ui::outro_warn(&ctx, "Activated with stale partitions left in place");
    }
    Ok(())
}

/// Returns whether every stale partition was removed
async fn run_activate(ctx: &UiContext, worker: &Worker) -> ShelfResult<bool> {
    let mut spinner = TaskSpinner::new(ctx);
    spinner.start("Reclaiming stale partitions...");

    match worker.activate().await {
        Ok(ReclaimOutcome::Completed(report)) => {
            spinner.stop(&format!(
                "Reclaimed {} partitions, kept {}",
                report.deleted.len(),
                report.kept.len()
            ));
            for name in &report.deleted {
                ui::step_ok_detail(ctx, "Deleted", name);
            }
            for (name, reason) in &report.failed {
                ui::step_error_detail(ctx, &format!("Failed to delete {}", name), reason);
            }
            Ok(report.is_clean())
        }
        Ok(ReclaimOutcome::Aborted(e)) => {
            spinner.stop("Reclamation skipped");
            ui::step_warn_hint(ctx, &e.to_string(), e.hint().unwrap_or_default());
            Ok(false)
        }
        Err(e) => {
            spinner.stop_error("Activation failed");
            Err(e)
        }
    }
}

/// Install and activate in one process
pub async fn update(config: &Config) -> ShelfResult<()> {
    let ctx = UiContext::detect();
    let (worker, dir) = new_worker(config).await?;

    ui::intro(&ctx, "shelf update");
    let summary = run_install(&ctx, &worker).await?;
    let clean = run_activate(&ctx, &worker).await?;

    let mut record = LifecycleRecord::new(WorkerState::Activated, worker.scheme().to_string());
    record.partitions = summary.partitions.into_iter().map(|(p, _)| p).collect();
    record.save(&dir).await?;

    if clean {
        ui::outro_success(&ctx, "Updated and activated");
    } else {
        ui::outro_warn(&ctx, "Updated; stale partitions left in place");
    }
    Ok(())
}

#[derive(Serialize)]
struct StatusView {
    state: WorkerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending: Option<WorkerState>,
    scheme: String,
    updated_at: Option<String>,
    store: String,
    partitions: Vec<String>,
}

/// Show the recorded lifecycle state and the partitions on disk
pub async fn status(args: StatusArgs, config: &Config) -> ShelfResult<()> {
    let store = open_store(config).await?;
    let record = LifecycleRecord::load(store.root()).await?;
    let view = StatusView {
        state: record.as_ref().map(|r| r.state).unwrap_or(WorkerState::Parsed),
        pending: record.as_ref().and_then(|r| r.pending),
        scheme: Scheme::from_config(config).to_string(),
        updated_at: record.as_ref().map(|r| r.updated_at.to_rfc3339()),
        store: ConfigManager::partitions_dir(config).display().to_string(),
        partitions: store.partition_names().await?,
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Plain => println!("{}", view.state),
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::intro(&ctx, "Status");
            ui::key_value_status(
                &ctx,
                "state",
                view.state.as_str(),
                view.state == WorkerState::Activated,
            );
            if let Some(pending) = view.pending {
                ui::key_value(&ctx, "pending install", pending.as_str());
            }
            ui::key_value(&ctx, "scheme", &view.scheme);
            ui::key_value(&ctx, "store", &view.store);
            if let Some(updated) = &view.updated_at {
                ui::key_value(&ctx, "updated", updated);
            }
            println!();
            if view.partitions.is_empty() {
                ui::step_info(&ctx, "No partitions");
            }
            for name in &view.partitions {
                println!("  {} {}", style("•").blue(), name);
            }
        }
    }
    Ok(())
}
