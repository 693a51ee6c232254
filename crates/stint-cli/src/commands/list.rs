use crate::cli::SortKey;
use crate::commands::common::{format_record_lines, record_to_list_item, Context, RecordListItem};
use crate::error::CliError;

pub fn run_list(
    ctx: &Context,
    sort: SortKey,
    active_only: bool,
    limit: Option<usize>,
    as_json: bool,
) -> Result<(), CliError> {
    let mut service = ctx.open_service()?;
    let records = service
        .sorted(sort.into())
        .iter()
        .filter(|record| !active_only || record.is_in_progress())
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect::<Vec<_>>();

    if as_json {
        let json_items = records
            .iter()
            .map(record_to_list_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}
