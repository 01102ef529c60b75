//! Partitions command - inspect or delete cache partitions

use super::open_store;
use crate::cli::args::{OutputFormat, PartitionAction, PartitionsArgs};
use crate::config::Config;
use crate::error::{ShelfError, ShelfResult};
use crate::store::{DiskStore, PartitionStore};
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;

/// Execute the partitions command
pub async fn execute(args: PartitionsArgs, config: &Config) -> ShelfResult<()> {
    let store = open_store(config).await?;

    match args.action {
        PartitionAction::List { format } => list_partitions(&store, format).await,
        PartitionAction::Show { name, format } => show_partition(&store, &name, format).await,
        PartitionAction::Delete { name, yes } => delete_partition(&store, &name, yes).await,
    }
}

#[derive(Serialize)]
struct PartitionSummary {
    name: String,
    entries: usize,
}

async fn list_partitions(store: &DiskStore, format: OutputFormat) -> ShelfResult<()> {
    let mut partitions = Vec::new();
    for name in store.partition_names().await? {
        let handle = store.open(&name).await?;
        let entries = store.keys(&handle).await?.len();
        partitions.push(PartitionSummary { name, entries });
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&partitions)?),
        OutputFormat::Plain => {
            for p in &partitions {
                println!("{}", p.name);
            }
        }
        OutputFormat::Table => {
            if partitions.is_empty() {
                ui::step_info(&UiContext::detect(), "No partitions");
                return Ok(());
            }
            println!("{:<40} {:>8}", style("PARTITION").bold(), style("ENTRIES").bold());
            println!("{}", "-".repeat(49));
            for p in &partitions {
                println!("{:<40} {:>8}", p.name, p.entries);
            }
            println!();
            println!("{} partition(s)", partitions.len());
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct EntryView {
    method: String,
    url: String,
    status: u16,
    kind: String,
    bytes: usize,
}

async fn show_partition(store: &DiskStore, name: &str, format: OutputFormat) -> ShelfResult<()> {
    // `open` would create a missing partition; inspection must not
    if !store.partition_names().await?.iter().any(|n| n == name) {
        return Err(ShelfError::PartitionNotFound(name.to_string()));
    }

    let handle = store.open(name).await?;
    let mut entries = Vec::new();
    for key in store.keys(&handle).await? {
        if let Some(response) = store.lookup(&handle, &key).await? {
            entries.push(EntryView {
                status: response.status,
                kind: response.kind.to_string(),
                bytes: response.body().len(),
                method: key.method,
                url: key.url,
            });
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for e in &entries {
                println!("{}", e.url);
            }
        }
        OutputFormat::Table => {
            ui::intro(&UiContext::detect(), name);
            println!(
                "{:<6} {:<6} {:<6} {:>9}  {}",
                style("METHOD").bold(),
                style("STATUS").bold(),
                style("KIND").bold(),
                style("BYTES").bold(),
                style("URL").bold()
            );
            for e in &entries {
                println!(
                    "{:<6} {:<6} {:<6} {:>9}  {}",
                    e.method, e.status, e.kind, e.bytes, e.url
                );
            }
            println!();
            println!("{} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
        }
    }
    Ok(())
}

async fn delete_partition(store: &DiskStore, name: &str, yes: bool) -> ShelfResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);

    if !store.partition_names().await?.iter().any(|n| n == name) {
        return Err(ShelfError::PartitionNotFound(name.to_string()));
    }

    if !ui::confirm(&ctx, &format!("Delete partition {}?", name), false).await? {
        ui::step_warn_hint(&ctx, "Not deleted", "Pass --yes to delete without a prompt");
        return Ok(());
    }

    store.delete(name).await?;
    ui::step_ok_detail(&ctx, "Deleted partition", name);
    Ok(())
}
