use stint_core::RecordDraft;

use crate::commands::common::{
    normalize_tag_args, normalize_title, parse_estimate, read_piped_stdin, Context,
};
use crate::error::CliError;

pub fn run_add(
    ctx: &Context,
    title_parts: &[String],
    tags: &[String],
    estimate: Option<&str>,
    body: Option<String>,
) -> Result<(), CliError> {
    let title = normalize_title(title_parts)?;
    let mut draft = RecordDraft::new(title).with_tags(normalize_tag_args(tags));
    if let Some(estimate) = estimate {
        draft = draft.with_estimate(parse_estimate(estimate)?);
    }
    let body = match body {
        Some(body) => Some(body),
        None => read_piped_stdin()?,
    };
    if let Some(body) = body {
        draft = draft.with_body(body);
    }

    let mut service = ctx.open_service()?;
    let record = service.create(draft)?;

    println!("{}", record.id);
    Ok(())
}
