use crate::commands::common::{format_record_details, normalize_record_identifier, Context};
use crate::error::CliError;

pub fn run_show(ctx: &Context, id: &str, as_json: bool) -> Result<(), CliError> {
    let normalized_id = normalize_record_identifier(id)?;
    let service = ctx.open_service()?;
    let record = service.resolve(&normalized_id)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        for line in format_record_details(record) {
            println!("{line}");
        }
    }
    Ok(())
}
