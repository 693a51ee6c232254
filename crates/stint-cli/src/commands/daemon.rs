use crate::commands::common::{format_timestamp, Context};
use crate::error::CliError;

pub async fn run_daemon(ctx: &Context) -> Result<(), CliError> {
    let reconciler = ctx.reconciler()?;
    let interval = reconciler.options().interval;
    reconciler.start()?;
    println!(
        "Reconciling every {} (Ctrl-C to stop)",
        humantime::format_duration(interval)
    );

    tokio::signal::ctrl_c().await?;
    println!("Stopping after the current pass...");
    reconciler.stop().await?;

    match reconciler.last_sync_time() {
        Some(last_sync) => println!("Last sync: {}", format_timestamp(last_sync.timestamp_millis())),
        None => println!("No pass completed"),
    }
    Ok(())
}
