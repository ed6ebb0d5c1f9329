// Construction-time reader configuration and the caller-supplied decision hooks.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::column::Column;
use crate::core::error::{Error, invalid_config};
use crate::core::policy::{MissingFieldAction, ParseError, ParseErrorAction};

pub const DEFAULT_BUFFER_SIZE: usize = 4096;
/// Upper bound on the character window; larger windows buy nothing for streaming reads.
pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_HEADER_NAME: &str = "Column";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimmingOptions {
    None,
    #[default]
    UnquotedOnly,
    QuotedOnly,
    All,
}

impl TrimmingOptions {
    pub fn trims_unquoted(self) -> bool {
        matches!(self, TrimmingOptions::UnquotedOnly | TrimmingOptions::All)
    }

    pub fn trims_quoted(self) -> bool {
        matches!(self, TrimmingOptions::QuotedOnly | TrimmingOptions::All)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderOptions {
    pub has_headers: bool,
    pub delimiter: char,
    pub quote: char,
    pub escape: char,
    pub comment: Option<char>,
    pub trimming: TrimmingOptions,
    pub buffer_size: usize,
    /// Field text treated as a database null by `is_null` and typed access.
    pub null_value: Option<String>,
    pub missing_field_action: MissingFieldAction,
    pub default_parse_error_action: ParseErrorAction,
    pub supports_multiline: bool,
    pub skip_empty_lines: bool,
    pub max_quoted_field_length: Option<usize>,
    pub default_header_name: String,
    pub use_column_defaults: bool,
    pub columns: Vec<Column>,
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self {
            has_headers: true,
            delimiter: ',',
            quote: '"',
            escape: '"',
            comment: Some('#'),
            trimming: TrimmingOptions::UnquotedOnly,
            buffer_size: DEFAULT_BUFFER_SIZE,
            null_value: None,
            missing_field_action: MissingFieldAction::ParseError,
            default_parse_error_action: ParseErrorAction::ThrowException,
            supports_multiline: true,
            skip_empty_lines: true,
            max_quoted_field_length: None,
            default_header_name: DEFAULT_HEADER_NAME.to_string(),
            use_column_defaults: false,
            columns: Vec::new(),
        }
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_escape(mut self, escape: char) -> Self {
        self.escape = escape;
        self
    }

    pub fn with_comment(mut self, comment: Option<char>) -> Self {
        self.comment = comment;
        self
    }

    pub fn with_trimming(mut self, trimming: TrimmingOptions) -> Self {
        self.trimming = trimming;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_missing_field_action(mut self, action: MissingFieldAction) -> Self {
        self.missing_field_action = action;
        self
    }

    pub fn with_parse_error_action(mut self, action: ParseErrorAction) -> Self {
        self.default_parse_error_action = action;
        self
    }

    pub fn with_multiline(mut self, supports_multiline: bool) -> Self {
        self.supports_multiline = supports_multiline;
        self
    }

    pub fn with_skip_empty_lines(mut self, skip_empty_lines: bool) -> Self {
        self.skip_empty_lines = skip_empty_lines;
        self
    }

    pub fn with_max_quoted_field_length(mut self, max: Option<usize>) -> Self {
        self.max_quoted_field_length = max;
        self
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.buffer_size == 0 {
            return Err(invalid_config("buffer size must be greater than zero"));
        }
        if self.buffer_size > MAX_BUFFER_SIZE {
            return Err(invalid_config(format!(
                "buffer size {} exceeds the maximum of {MAX_BUFFER_SIZE}",
                self.buffer_size
            )));
        }
        if self.delimiter == '\n' || self.quote == '\n' {
            return Err(invalid_config("delimiter and quote cannot be a line feed"));
        }
        if self.delimiter == self.quote {
            return Err(invalid_config("delimiter and quote must differ"));
        }
        if self.delimiter == self.escape {
            return Err(invalid_config("delimiter and escape must differ"));
        }
        if let Some(comment) = self.comment {
            if comment == self.delimiter || comment == self.quote {
                return Err(invalid_config(
                    "comment char must differ from delimiter and quote",
                ));
            }
        }
        if self.max_quoted_field_length == Some(0) {
            return Err(invalid_config("max quoted field length must be positive"));
        }
        Ok(())
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::new()
    }
}

pub type ParseErrorHook = Box<dyn FnMut(&ParseError, ParseErrorAction) -> ParseErrorAction>;
pub type DuplicateHeaderHook = Box<dyn FnMut(&str, usize, usize) -> Option<String>>;

/// Decision callbacks supplied at construction.
#[derive(Default)]
pub struct ReaderHooks {
    /// Receives the error plus the suggested action and returns the action to apply.
    pub on_parse_error: Option<ParseErrorHook>,
    /// Receives `(name, index, existing_index)`; a returned name is registered instead.
    pub on_duplicate_header: Option<DuplicateHeaderHook>,
}

impl ReaderHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_parse_error(
        mut self,
        hook: impl FnMut(&ParseError, ParseErrorAction) -> ParseErrorAction + 'static,
    ) -> Self {
        self.on_parse_error = Some(Box::new(hook));
        self
    }

    pub fn on_duplicate_header(
        mut self,
        hook: impl FnMut(&str, usize, usize) -> Option<String> + 'static,
    ) -> Self {
        self.on_duplicate_header = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for ReaderHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderHooks")
            .field("on_parse_error", &self.on_parse_error.is_some())
            .field("on_duplicate_header", &self.on_duplicate_header.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_BUFFER_SIZE, ReaderOptions, TrimmingOptions};
    use crate::core::error::ErrorKind;
    use crate::core::policy::MissingFieldAction;

    #[test]
    fn defaults_match_documented_values() {
        let options = ReaderOptions::default();
        assert!(options.has_headers);
        assert_eq!(options.delimiter, ',');
        assert_eq!(options.comment, Some('#'));
        assert_eq!(options.trimming, TrimmingOptions::UnquotedOnly);
        assert_eq!(options.buffer_size, 4096);
        assert!(options.skip_empty_lines);
        assert!(options.supports_multiline);
        assert_eq!(options.default_header_name, "Column");
        options.validate().expect("defaults are valid");
    }

    #[test]
    fn trimming_scopes_are_independent() {
        assert!(TrimmingOptions::UnquotedOnly.trims_unquoted());
        assert!(!TrimmingOptions::UnquotedOnly.trims_quoted());
        assert!(TrimmingOptions::QuotedOnly.trims_quoted());
        assert!(!TrimmingOptions::QuotedOnly.trims_unquoted());
        assert!(TrimmingOptions::All.trims_quoted() && TrimmingOptions::All.trims_unquoted());
        assert!(!TrimmingOptions::None.trims_quoted() && !TrimmingOptions::None.trims_unquoted());
    }

    #[test]
    fn conflicting_characters_are_rejected() {
        let cases = [
            ReaderOptions::new().with_buffer_size(0),
            ReaderOptions::new().with_delimiter('"'),
            ReaderOptions::new().with_escape(','),
            ReaderOptions::new().with_comment(Some(',')),
            ReaderOptions::new().with_delimiter('\n'),
        ];
        for options in cases {
            let err = options.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        }
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        ReaderOptions::new()
            .with_buffer_size(MAX_BUFFER_SIZE)
            .validate()
            .expect("maximum is allowed");
        for size in [MAX_BUFFER_SIZE + 1, usize::MAX] {
            let err = ReaderOptions::new().with_buffer_size(size).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        }
    }

    #[test]
    fn options_load_from_partial_json() {
        let options: ReaderOptions = serde_json::from_str(
            r#"{"delimiter":";","has_headers":false,"missing_field_action":"replace_by_empty"}"#,
        )
        .expect("options json");
        assert_eq!(options.delimiter, ';');
        assert!(!options.has_headers);
        assert_eq!(
            options.missing_field_action,
            MissingFieldAction::ReplaceByEmpty
        );
        assert_eq!(options.quote, '"');
    }

    #[test]
    fn unknown_option_fields_are_rejected() {
        let result = serde_json::from_str::<ReaderOptions>(r#"{"delimeter":";"}"#);
        assert!(result.is_err());
    }
}
