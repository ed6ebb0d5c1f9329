// Error taxonomy shared by the tokenizer, readers, cache, view, and CLI.
use std::error::Error as StdError;
use std::fmt;

const MAX_RAW_CHARS: usize = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Malformed,
    MissingField,
    DuplicateHeader,
    InvalidState,
    InvalidConfig,
    NotSupported,
    Io,
}

impl ErrorKind {
    /// Missing-field failures are a specialization of malformed data.
    pub fn is_malformed(self) -> bool {
        matches!(self, ErrorKind::Malformed | ErrorKind::MissingField)
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Malformed => "malformed",
            ErrorKind::MissingField => "missing_field",
            ErrorKind::DuplicateHeader => "duplicate_header",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::NotSupported => "not_supported",
            ErrorKind::Io => "io",
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    record: Option<i64>,
    field: Option<usize>,
    position: Option<usize>,
    raw: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            record: None,
            field: None,
            position: None,
            raw: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn record(&self) -> Option<i64> {
        self.record
    }

    pub fn field(&self) -> Option<usize> {
        self.field
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_record(mut self, record: i64) -> Self {
        self.record = Some(record);
        self
    }

    pub fn with_field(mut self, field: usize) -> Self {
        self.field = Some(field);
        self
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_raw(mut self, raw: &str) -> Self {
        self.raw = Some(truncate_snippet(raw, MAX_RAW_CHARS));
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(record) = self.record {
            write!(f, " (record: {record})")?;
        }
        if let Some(field) = self.field {
            write!(f, " (field: {field})")?;
        }
        if let Some(position) = self.position {
            write!(f, " (position: {position})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::InvalidConfig => 2,
        ErrorKind::Malformed => 3,
        ErrorKind::MissingField => 4,
        ErrorKind::DuplicateHeader => 5,
        ErrorKind::InvalidState => 6,
        ErrorKind::NotSupported => 7,
        ErrorKind::Io => 8,
    }
}

pub(crate) fn invalid_state(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidState).with_message(message)
}

pub(crate) fn invalid_config(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidConfig).with_message(message)
}

/// Cuts `input` to at most `max` chars, ending with `...` when shortened.
pub(crate) fn truncate_snippet(input: &str, max: usize) -> String {
    let count = input.chars().count();
    if count <= max {
        return input.to_string();
    }
    let suffix = "...";
    if max <= suffix.len() {
        return suffix[..max].to_string();
    }
    let mut snippet: String = input.chars().take(max - suffix.len()).collect();
    snippet.push_str(suffix);
    snippet
}
