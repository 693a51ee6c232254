use crate::commands::common::{normalize_record_identifier, Context};
use crate::error::CliError;

pub fn run_delete(ctx: &Context, id: &str) -> Result<(), CliError> {
    let normalized_id = normalize_record_identifier(id)?;
    let mut service = ctx.open_service()?;
    let record_id = service.resolve(&normalized_id)?.id.clone();

    service.delete(&record_id)?;
    println!("{record_id}");
    Ok(())
}
