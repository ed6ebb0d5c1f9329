//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`, `parse_error_notice`, `notice_time_now`.
//! Role: Shared contract helper for CLI diagnostics such as skipped malformed lines.
//! Invariants: Notices are non-fatal and never alter stdout payloads.
//! Invariants: JSON schema is additive-only; `details` carries event-specific fields.
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::api::{ParseError, ParseErrorKind};
use crate::core::error::truncate_snippet;

const RAW_SNIPPET_MAX: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub cmd: String,
    pub input: String,
    pub message: String,
    pub details: Map<String, Value>,
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("cmd".to_string(), json!(notice.cmd));
    inner.insert("input".to_string(), json!(notice.input));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

pub fn notice_time_now() -> Option<String> {
    OffsetDateTime::now_utc().format(&Rfc3339).ok()
}

/// Notice for a malformed line that was skipped instead of failing the command.
pub fn parse_error_notice(cmd: &str, input: &str, error: &ParseError) -> Notice {
    let kind = match error.kind {
        ParseErrorKind::Malformed => "malformed",
        ParseErrorKind::MissingField => "missing_field",
    };
    let mut details = Map::new();
    details.insert("error_kind".to_string(), json!(kind));
    details.insert("record".to_string(), json!(error.record_index));
    details.insert("field".to_string(), json!(error.field_index));
    details.insert("position".to_string(), json!(error.position));
    details.insert("snippet".to_string(), json!(truncate_snippet(&error.raw, RAW_SNIPPET_MAX)));
    Notice {
        kind: "parse_skip".to_string(),
        time: notice_time_now().unwrap_or_else(|| "unknown".to_string()),
        cmd: cmd.to_string(),
        input: input.to_string(),
        message: format!("Skipped line: {}.", error.message),
        details,
    }
}
