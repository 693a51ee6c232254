use stint_core::Record;

use crate::commands::common::{
    capture_editor_input_with_initial, normalize_content, normalize_record_identifier,
    normalize_tag_args, parse_estimate, Context,
};
use crate::error::CliError;

/// Field changes requested on the command line
#[derive(Debug, Default)]
pub struct RecordEdits {
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub estimate: Option<String>,
    pub body: Option<String>,
}

impl RecordEdits {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.tags.is_empty() && self.estimate.is_none() && self.body.is_none()
    }

    /// Apply the edits; returns whether anything changed
    pub fn apply(&self, record: &mut Record) -> Result<bool, CliError> {
        let before = record.clone();
        if let Some(title) = &self.title {
            record.title = normalize_content(title).ok_or(CliError::EmptyTitle)?;
        }
        if !self.tags.is_empty() {
            record.tags = normalize_tag_args(&self.tags);
        }
        if let Some(estimate) = &self.estimate {
            record.estimated_duration = parse_estimate(estimate)?;
        }
        if let Some(body) = &self.body {
            record.body = body.trim().to_string();
        }
        Ok(*record != before)
    }
}

pub fn run_edit(ctx: &Context, id: &str, edits: &RecordEdits) -> Result<(), CliError> {
    let normalized_id = normalize_record_identifier(id)?;
    let mut service = ctx.open_service()?;
    let mut record = service.resolve(&normalized_id)?.clone();

    let changed = if edits.is_empty() {
        let edited_body = capture_editor_input_with_initial(&record.body)?.unwrap_or_default();
        let changed = edited_body != record.body;
        record.body = edited_body;
        changed
    } else {
        edits.apply(&mut record)?
    };

    if !changed {
        println!("{}", record.id);
        return Ok(());
    }

    let saved = service.save(record)?;
    println!("{}", saved.id);
    Ok(())
}
