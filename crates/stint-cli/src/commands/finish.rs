use stint_core::util::unix_millis_now;

use crate::commands::common::{normalize_record_identifier, Context};
use crate::error::CliError;

pub fn run_finish(ctx: &Context, id: &str) -> Result<(), CliError> {
    let normalized_id = normalize_record_identifier(id)?;
    let mut service = ctx.open_service()?;
    let mut record = service.resolve(&normalized_id)?.clone();
    if !record.is_in_progress() {
        return Err(CliError::AlreadyFinished(record.id.to_string()));
    }

    record.ended_at = Some(unix_millis_now());
    let saved = service.save(record)?;
    println!("{}", saved.id);
    Ok(())
}
