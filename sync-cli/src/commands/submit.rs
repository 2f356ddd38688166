//! Submit a record.

use anyhow::Result;

use crate::app::{App, FlushSummary};
use crate::input;

/// Run the submit command.
pub async fn run(app: &App, entity: &str, fields: &[String], json: Option<&str>) -> Result<()> {
    let resource = app.resource(entity)?;
    let record = input::parse_record(resource.schema(), fields, json)?;

    let change_id = resource.submit(record).await?;
    println!("Queued {} submission ({})", entity, change_id);

    let summary = app.flush().await?;
    println!("{}", delivery_message(&summary));
    Ok(())
}

fn delivery_message(summary: &FlushSummary) -> String {
    if summary.remaining == 0 {
        "Delivered to backend.".to_string()
    } else if summary.connected {
        format!(
            "{} change(s) could not be applied and stay queued. Run 'bastion pending' for details.",
            summary.remaining
        )
    } else {
        format!(
            "Backend unreachable; {} change(s) pending. Run 'bastion flush' to retry.",
            summary.remaining
        )
    }
}
