use stint_core::SyncReport;

use crate::commands::common::{format_timestamp, Context};
use crate::error::CliError;

pub async fn run_sync(ctx: &Context, as_json: bool) -> Result<SyncReport, CliError> {
    let reconciler = ctx.reconciler()?;

    let (report, last_sync) = tokio::task::spawn_blocking(move || {
        reconciler
            .reconcile_once()
            .map(|report| (report, reconciler.last_sync_time()))
    })
    .await
    .map_err(|error| CliError::Task(error.to_string()))??;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Sync completed: {report}");
        if let Some(last_sync) = last_sync {
            println!("Last sync: {}", format_timestamp(last_sync.timestamp_millis()));
        }
    }
    Ok(report)
}
