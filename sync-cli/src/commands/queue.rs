//! Inspect and drive the pending-change log.

use anyhow::Result;
use bastion_sync_types::StoredChange;

use crate::app::App;

/// List pending changes, oldest first.
pub async fn pending(app: &App) -> Result<()> {
    let changes = app.sync().pending_changes().await?;
    if changes.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }

    println!("{} pending change(s):", changes.len());
    for change in &changes {
        println!("  {}", describe(change));
    }
    Ok(())
}

/// Probe the backend and replay pending changes.
pub async fn flush(app: &App) -> Result<()> {
    let summary = app.flush().await?;

    println!("Backend:   {}", if summary.connected { "reachable" } else { "unreachable" });
    println!("Applied:   {}", summary.applied);
    println!("Remaining: {}", summary.remaining);
    Ok(())
}

/// Drop every pending change.
pub async fn clear(app: &App) -> Result<()> {
    let count = app.sync().pending_count().await?;
    app.sync().clear_pending().await?;
    println!("Discarded {} pending change(s).", count);
    Ok(())
}

fn describe(stored: &StoredChange) -> String {
    let change = &stored.change;
    match change.record_id() {
        Some(id) => format!("{}  {} {} {}", stored.id, change.operation, change.table, id),
        None => format!("{}  {} {}", stored.id, change.operation, change.table),
    }
}
