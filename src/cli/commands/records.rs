//! Records command - CRUD over an app's record store

use crate::cli::args::{OutputFormat, RecordAction, RecordsArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{ShelfError, ShelfResult};
use crate::records::{FileRecordStore, Record, RecordStore};
use crate::ui::{self, UiContext};
use console::style;
use serde_json::{Map, Value};

/// Execute the records command
pub async fn execute(args: RecordsArgs, config: &Config) -> ShelfResult<()> {
    let store = FileRecordStore::new(&ConfigManager::records_dir(config), &args.store)?;
    store.init().await?;
    let ctx = UiContext::detect();

    match args.action {
        RecordAction::Add { fields } => {
            let id = store.add(to_fields(fields)).await?;
            ui::step_ok_detail(&ctx, "Added record", &id.to_string());
        }
        RecordAction::Get { id } => {
            let record = store.get(id).await?.ok_or(ShelfError::RecordNotFound(id))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        RecordAction::Update { id, fields } => {
            let mut record = store.get(id).await?.ok_or(ShelfError::RecordNotFound(id))?;
            record.fields.extend(to_fields(fields));
            store.update(record).await?;
            ui::step_ok_detail(&ctx, "Updated record", &id.to_string());
        }
        RecordAction::Delete { id } => {
            if !store.delete(id).await? {
                return Err(ShelfError::RecordNotFound(id));
            }
            ui::step_ok_detail(&ctx, "Deleted record", &id.to_string());
        }
        RecordAction::List { format } => print_records(&store.get_all().await?, format)?,
    }
    Ok(())
}

/// Field values that parse as JSON keep their type; anything else is a string
fn to_fields(pairs: Vec<(String, String)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            (key, value)
        })
        .collect()
}

fn print_records(records: &[Record], format: OutputFormat) -> ShelfResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Plain => {
            for record in records {
                println!("{}", record.id);
            }
        }
        OutputFormat::Table => {
            if records.is_empty() {
                ui::step_info(&UiContext::detect(), "No records");
                return Ok(());
            }
            println!("{:<6} {}", style("ID").bold(), style("FIELDS").bold());
            for record in records {
                println!("{:<6} {}", record.id, Value::Object(record.fields.clone()));
            }
        }
    }
    Ok(())
}
