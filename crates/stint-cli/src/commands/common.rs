use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::Serialize;
use stint_core::config::{default_config_path, AppConfig};
use stint_core::models::normalize_tags;
use stint_core::{Error, Record, RecordService, Reconciler, Store};

use crate::error::CliError;

/// Resolved configuration shared by every command
pub struct Context {
    pub config: AppConfig,
    pub config_path: Option<PathBuf>,
}

impl Context {
    pub fn load(config_path: Option<PathBuf>, local: Option<String>) -> Result<Self, CliError> {
        let config_path = config_path.or_else(default_config_path);
        let mut config = AppConfig::load(config_path.as_deref())?;
        if let Some(local) = stint_core::util::normalize_text_option(local) {
            config.storage.local = Some(local);
        }
        Ok(Self {
            config,
            config_path,
        })
    }

    pub const fn from_config(config: AppConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    pub fn open_local(&self) -> Result<Arc<dyn Store>, CliError> {
        Ok(self.config.local_descriptor()?.open("local")?)
    }

    /// Record service over the local replica with its working set loaded
    pub fn open_service(&self) -> Result<RecordService, CliError> {
        let mut service = RecordService::new(self.open_local()?);
        service.load_all()?;
        Ok(service)
    }

    pub fn reconciler(&self) -> Result<Reconciler, CliError> {
        let (remote, options) = self.config.require_remote().map_err(|error| match error {
            Error::ConfigurationMissing(reason) => CliError::SyncNotConfigured(reason),
            other => CliError::Core(other),
        })?;
        let local = self.open_local()?;
        let remote = remote.open("remote")?;
        Ok(Reconciler::new(
            local,
            remote,
            options,
            tracing::info_span!("reconciler"),
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub last_modified: i64,
    pub in_progress: bool,
    pub estimated_ms: u128,
    pub relative_time: String,
}

pub fn record_to_list_item(record: &Record) -> RecordListItem {
    let now_ms = Utc::now().timestamp_millis();
    RecordListItem {
        id: record.id.to_string(),
        title: record.title.clone(),
        tags: record.tags.clone(),
        started_at: record.started_at,
        ended_at: record.ended_at,
        last_modified: record.last_modified,
        in_progress: record.is_in_progress(),
        estimated_ms: record.estimated_duration.as_millis(),
        relative_time: format_relative_time(record.last_modified, now_ms),
    }
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    records
        .iter()
        .map(|record| {
            let short_id = record.id.short(13);
            let title = truncate(&record.title, 40);
            let status = if record.is_in_progress() { "*" } else { " " };
            let relative_time = format_relative_time(record.last_modified, now_ms);
            let tags = record.render_tags();

            if tags.is_empty() {
                format!("{short_id:<13} {status} {title:<40}  {relative_time}")
            } else {
                format!("{short_id:<13} {status} {title:<40}  {relative_time:<10}  {tags}")
            }
        })
        .collect()
}

pub fn format_record_details(record: &Record) -> Vec<String> {
    let mut lines = vec![
        format!("ID:        {}", record.id),
        format!("Title:     {}", record.title),
    ];
    if !record.tags.is_empty() {
        lines.push(format!("Tags:      {}", record.render_tags()));
    }
    lines.push(format!(
        "Started:   {}",
        record
            .started_at
            .map_or_else(|| "-".to_string(), format_timestamp)
    ));
    lines.push(format!(
        "Finished:  {}",
        record
            .ended_at
            .map_or_else(|| "in progress".to_string(), format_timestamp)
    ));
    if !record.estimated_duration.is_zero() {
        lines.push(format!(
            "Estimate:  {}",
            humantime::format_duration(record.estimated_duration)
        ));
    }
    if let Some(bias) = record.estimation_bias() {
        lines.push(format!("Bias:      {}", format_bias(bias)));
    }
    lines.push(format!("Modified:  {}", format_timestamp(record.last_modified)));
    if !record.body.is_empty() {
        lines.push(String::new());
        lines.extend(record.body.lines().map(str::to_string));
    }
    lines
}

/// Signed estimate error, e.g. `+30m` (finished early) or `-1h 5m` (overran)
pub fn format_bias(bias: chrono::Duration) -> String {
    let sign = if bias < chrono::Duration::zero() { '-' } else { '+' };
    let magnitude = bias.abs().to_std().unwrap_or_default();
    let rounded = Duration::from_secs(magnitude.as_secs() / 60 * 60);
    if rounded.is_zero() {
        return "on time".to_string();
    }
    format!("{sign}{}", humantime::format_duration(rounded))
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn parse_estimate(input: &str) -> Result<Duration, CliError> {
    humantime::parse_duration(input.trim()).map_err(|error| CliError::InvalidDuration {
        input: input.to_string(),
        reason: error.to_string(),
    })
}

pub fn normalize_title(parts: &[String]) -> Result<String, CliError> {
    normalize_content(&parts.join(" ")).ok_or(CliError::EmptyTitle)
}

pub fn normalize_tag_args(tags: &[String]) -> Vec<String> {
    normalize_tags(tags.iter().flat_map(|tag| tag.split(',')))
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_record_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyRecordId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_body_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let body = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&body))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_body_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("stint-body-{}-{now}.md", std::process::id()))
}
