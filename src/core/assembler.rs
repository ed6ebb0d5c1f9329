// Builds logical records from tokenizer fields and applies the malformed/missing-field policies.
use crate::core::error::{Error, invalid_state};
use crate::core::options::{ParseErrorHook, ReaderOptions};
use crate::core::policy::{MissingFieldAction, ParseError, ParseErrorAction, ParseErrorKind};
use crate::core::record::Record;
use crate::core::source::CharSource;
use crate::core::tokenizer::{Fault, Tokenizer};

enum Outcome {
    Complete,
    Skipped,
}

pub(crate) struct RecordAssembler<S> {
    tokenizer: Tokenizer<S>,
    record: Record,
    /// Established by the first logical record (header row included).
    field_count: Option<usize>,
    missing_field_action: MissingFieldAction,
    parse_error_action: ParseErrorAction,
    multiline: bool,
    on_parse_error: Option<ParseErrorHook>,
    missing_field_flag: bool,
    parse_error_flag: bool,
}

impl<S: CharSource> RecordAssembler<S> {
    pub fn new(
        tokenizer: Tokenizer<S>,
        options: &ReaderOptions,
        on_parse_error: Option<ParseErrorHook>,
    ) -> Self {
        Self {
            tokenizer,
            record: Record::default(),
            field_count: None,
            missing_field_action: options.missing_field_action,
            parse_error_action: options.default_parse_error_action,
            multiline: options.supports_multiline,
            on_parse_error,
            missing_field_flag: false,
            parse_error_flag: false,
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn field_count(&self) -> Option<usize> {
        self.field_count
    }

    pub fn missing_field_flag(&self) -> bool {
        self.missing_field_flag
    }

    /// Set when malformed lines were skipped while producing the current record.
    pub fn parse_error_flag(&self) -> bool {
        self.parse_error_flag
    }

    pub fn close(&mut self) {
        self.tokenizer.close();
        self.record.clear();
    }

    /// Reads the next logical record into the arena; `false` at end of stream.
    pub fn read_record(&mut self, record_index: i64) -> Result<bool, Error> {
        self.parse_error_flag = false;
        loop {
            self.missing_field_flag = false;
            if !self.tokenizer.skip_ignorable_lines()? {
                self.record.clear();
                return Ok(false);
            }
            match self.assemble(record_index)? {
                Outcome::Complete => return Ok(true),
                Outcome::Skipped => self.parse_error_flag = true,
            }
        }
    }

    fn assemble(&mut self, record_index: i64) -> Result<Outcome, Error> {
        let expected = self.field_count;
        self.record.begin(expected.unwrap_or(0));
        let mut field_index = 0usize;
        loop {
            let slot = self.record.next_slot();
            let end = match self.tokenizer.read_field(slot) {
                Ok(end) => end,
                Err(Fault::Fatal(err)) => return Err(err),
                Err(Fault::Malformed(message)) => {
                    return self.reject(ParseErrorKind::Malformed, message, record_index, field_index);
                }
            };
            if end.crossed_line && !self.multiline {
                return self.reject(
                    ParseErrorKind::Malformed,
                    "line break inside quoted field while multiline is disabled".to_string(),
                    record_index,
                    field_index,
                );
            }
            field_index += 1;

            match expected {
                Some(expected) if !end.end_of_record && field_index == expected => {
                    return self.reject(
                        ParseErrorKind::Malformed,
                        format!("record has more than {expected} fields"),
                        record_index,
                        field_index,
                    );
                }
                Some(expected) if end.end_of_record && field_index < expected => {
                    return self.missing(record_index, field_index, expected);
                }
                _ => {}
            }

            if end.end_of_record {
                self.tokenizer.consume_line_end()?;
                if expected.is_none() {
                    self.field_count = Some(field_index);
                }
                return Ok(Outcome::Complete);
            }
        }
    }

    fn missing(
        &mut self,
        record_index: i64,
        field_index: usize,
        expected: usize,
    ) -> Result<Outcome, Error> {
        match self.missing_field_action {
            MissingFieldAction::ParseError => self.reject(
                ParseErrorKind::MissingField,
                format!("record has {field_index} fields, expected {expected}"),
                record_index,
                field_index,
            ),
            MissingFieldAction::ReplaceByEmpty => {
                self.record.fill_empty(expected);
                self.finish_missing()
            }
            MissingFieldAction::ReplaceByNull => {
                self.record.fill_null(expected);
                self.finish_missing()
            }
        }
    }

    fn finish_missing(&mut self) -> Result<Outcome, Error> {
        self.missing_field_flag = true;
        self.tokenizer.consume_line_end()?;
        Ok(Outcome::Complete)
    }

    fn reject(
        &mut self,
        kind: ParseErrorKind,
        message: String,
        record_index: i64,
        field_index: usize,
    ) -> Result<Outcome, Error> {
        let (raw, position) = self.tokenizer.snapshot();
        let error = ParseError {
            kind,
            message,
            raw,
            position,
            record_index,
            field_index,
        };
        let action = match self.parse_error_action {
            ParseErrorAction::RaiseEvent => match self.on_parse_error.as_mut() {
                Some(hook) => hook(&error, ParseErrorAction::ThrowException),
                None => ParseErrorAction::ThrowException,
            },
            action => action,
        };
        match action {
            ParseErrorAction::ThrowException => Err(error.into_error()),
            ParseErrorAction::AdvanceToNextLine => {
                tracing::warn!(
                    record = record_index,
                    field = field_index,
                    message = %error.message,
                    "skipping malformed line"
                );
                self.tokenizer.skip_line()?;
                Ok(Outcome::Skipped)
            }
            ParseErrorAction::RaiseEvent => Err(invalid_state(
                "parse error handler must resolve to throw or advance",
            )
            .with_record(record_index)
            .with_field(field_index)),
        }
    }
}
