//! Show connectivity and queue status.

use anyhow::Result;
use serde::Serialize;

use crate::app::App;

/// What `bastion status` reports.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// `live` or `mock`.
    pub source: &'static str,
    /// Result of a fresh probe.
    pub connected: bool,
    /// Entries in the change log.
    pub pending_changes: usize,
}

/// Probe the backend and collect the report.
pub async fn collect(app: &App) -> Result<StatusReport> {
    let connected = app.sync().connection().probe_now().await;
    Ok(StatusReport {
        source: app.source_name(),
        connected,
        pending_changes: app.sync().pending_count().await?,
    })
}

/// Run the status command.
pub async fn run(app: &App, json: bool) -> Result<()> {
    let report = collect(app).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== bastion status ===");
    println!();
    println!("Backend:");
    println!("  Source: {}", report.source);
    println!(
        "  Status: {}",
        if report.connected { "ONLINE" } else { "OFFLINE" }
    );
    println!();
    println!("Pending changes: {}", report.pending_changes);
    if report.pending_changes > 0 && report.connected {
        println!();
        println!("Run 'bastion flush' to deliver them.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::mock_app;
    use tempfile::tempdir;

    #[tokio::test]
    async fn mock_backend_is_online() {
        let dir = tempdir().unwrap();
        let app = mock_app(dir.path()).await;

        let report = collect(&app).await.unwrap();
        assert_eq!(report.source, "mock");
        assert!(report.connected);
        assert_eq!(report.pending_changes, 0);
    }

    #[tokio::test]
    async fn status_runs_in_both_formats() {
        let dir = tempdir().unwrap();
        let app = mock_app(dir.path()).await;

        assert!(run(&app, false).await.is_ok());
        assert!(run(&app, true).await.is_ok());
    }

    #[test]
    fn report_serializes_with_field_names() {
        let report = StatusReport {
            source: "live",
            connected: false,
            pending_changes: 3,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"source": "live", "connected": false, "pending_changes": 3})
        );
    }
}
