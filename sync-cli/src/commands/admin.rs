//! Back-office moderation and editing.

use anyhow::Result;
use bastion_sync_core::{ResourceSchema, SubmissionStatus};
use bastion_sync_types::{Record, RecordId};
use serde_json::Value;

use crate::app::App;
use crate::input;

/// List records of `entity`.
pub async fn list(app: &App, entity: &str, status: Option<SubmissionStatus>) -> Result<()> {
    let resource = app.resource(entity)?;
    let records = resource.list(status).await?;

    if records.is_empty() {
        println!("No {} records.", entity);
        return Ok(());
    }
    for record in &records {
        println!("{}", summary_line(resource.schema(), record));
    }
    Ok(())
}

/// Approve or reject a record.
pub async fn set_status(
    app: &App,
    entity: &str,
    id: &str,
    status: SubmissionStatus,
) -> Result<()> {
    let resource = app.resource(entity)?;
    let record = resource.set_status(&RecordId::new(id), status).await?;
    println!("{}", summary_line(resource.schema(), &record));
    Ok(())
}

/// Change fields of a record.
pub async fn edit(app: &App, entity: &str, id: &str, fields: &[String]) -> Result<()> {
    let resource = app.resource(entity)?;
    let changes = input::parse_record(resource.schema(), fields, None)?;
    let record = resource.update(&RecordId::new(id), changes).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Remove a record.
pub async fn delete(app: &App, entity: &str, id: &str) -> Result<()> {
    let resource = app.resource(entity)?;
    resource.delete(&RecordId::new(id)).await?;
    println!("Deleted {} {}", entity, id);
    Ok(())
}

/// Print records as JSON lines.
pub async fn export(app: &App, entity: &str, status: Option<SubmissionStatus>) -> Result<()> {
    let resource = app.resource(entity)?;
    for record in resource.export(status).await? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

/// `id  status  first-field` for one record.
fn summary_line(schema: &ResourceSchema, record: &Record) -> String {
    let text = |value: Option<&Value>| match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    };

    let id = text(record.get("id"));
    let title = text(schema.fields.first().and_then(|f| record.get(f.name)));
    if schema.moderated {
        format!("{}  {:<8}  {}", id, text(record.get("status")), title)
    } else {
        format!("{}  {}", id, title)
    }
}
