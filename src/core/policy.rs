// Parse-error value and the policies that decide what happens to malformed records.
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

/// What to do when a record is malformed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorAction {
    #[default]
    ThrowException,
    RaiseEvent,
    AdvanceToNextLine,
}

/// What to do when a record ends before the established field count.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldAction {
    #[default]
    ParseError,
    ReplaceByEmpty,
    ReplaceByNull,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseErrorKind {
    Malformed,
    MissingField,
}

/// Snapshot of malformed input, captured where the tokenizer stopped.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Content of the buffer window at detection time.
    pub raw: String,
    /// Cursor position inside `raw`.
    pub position: usize,
    pub record_index: i64,
    pub field_index: usize,
}

impl ParseError {
    pub fn into_error(self) -> Error {
        let kind = match self.kind {
            ParseErrorKind::Malformed => ErrorKind::Malformed,
            ParseErrorKind::MissingField => ErrorKind::MissingField,
        };
        Error::new(kind)
            .with_message(self.message)
            .with_record(self.record_index)
            .with_field(self.field_index)
            .with_position(self.position)
            .with_raw(&self.raw)
    }
}
