// Forward-only reader: header resolution, field access, typed values, lifecycle.
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use crate::core::assembler::RecordAssembler;
use crate::core::buffer::CharBuffer;
use crate::core::column::{Column, ColumnKind, ColumnRegistry};
use crate::core::convert::{Converted, Value};
use crate::core::cursor::RecordStream;
use crate::core::error::{Error, ErrorKind, invalid_config, invalid_state};
use crate::core::options::{DuplicateHeaderHook, ReaderHooks, ReaderOptions};
use crate::core::record::Record;
use crate::core::source::{CharSource, ReadSource, StrSource};
use crate::core::tokenizer::{Dialect, Tokenizer};

/// Streaming CSV reader over any [`CharSource`].
///
/// Headers (or synthesized column names) are resolved lazily on first use.
/// Each successful [`read_next_record`](Self::read_next_record) replaces the
/// current record and bumps [`version`](RecordStream::version).
pub struct CsvReader<S: CharSource> {
    assembler: RecordAssembler<S>,
    options: ReaderOptions,
    columns: ColumnRegistry,
    header_names: Vec<String>,
    header_index: HashMap<String, usize>,
    on_duplicate_header: Option<DuplicateHeaderHook>,
    field_count: usize,
    initialized: bool,
    /// Latched when header resolution fails; the reader is unusable afterwards.
    failed: bool,
    pending_first: bool,
    has_record: bool,
    eof: bool,
    closed: bool,
    record_index: i64,
    version: u64,
}

impl CsvReader<StrSource> {
    pub fn from_text(text: impl AsRef<str>, options: ReaderOptions) -> Result<Self, Error> {
        Self::new(StrSource::new(text), options)
    }
}

impl CsvReader<ReadSource<File>> {
    pub fn open(path: impl AsRef<Path>, options: ReaderOptions) -> Result<Self, Error> {
        Self::new(ReadSource::open(path)?, options)
    }
}

impl<S: CharSource> CsvReader<S> {
    pub fn new(source: S, options: ReaderOptions) -> Result<Self, Error> {
        Self::with_hooks(source, options, ReaderHooks::default())
    }

    pub fn with_hooks(source: S, options: ReaderOptions, hooks: ReaderHooks) -> Result<Self, Error> {
        options.validate()?;
        let columns = ColumnRegistry::from_columns(options.columns.clone())?;
        let buffer = CharBuffer::new(source, options.buffer_size)?;
        let tokenizer = Tokenizer::new(buffer, Dialect::from_options(&options));
        let assembler = RecordAssembler::new(tokenizer, &options, hooks.on_parse_error);
        Ok(Self {
            assembler,
            options,
            columns,
            header_names: Vec::new(),
            header_index: HashMap::new(),
            on_duplicate_header: hooks.on_duplicate_header,
            field_count: 0,
            initialized: false,
            failed: false,
            pending_first: false,
            has_record: false,
            eof: false,
            closed: false,
            record_index: -1,
            version: 0,
        })
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Reads the header row (or peeks the first record) and fixes the field count.
    /// Called implicitly by the first read; idempotent.
    pub fn initialize(&mut self) -> Result<(), Error> {
        self.ensure_open()?;
        if self.initialized {
            return Ok(());
        }
        self.resolve_headers().inspect_err(|_| self.failed = true)
    }

    fn resolve_headers(&mut self) -> Result<(), Error> {
        let has_headers = self.options.has_headers;
        let found = self.assembler.read_record(if has_headers { -1 } else { 0 })?;
        let field_count = self
            .assembler
            .field_count()
            .unwrap_or(self.columns.len());
        if found && !self.columns.is_empty() && self.columns.len() != field_count {
            return Err(invalid_config(format!(
                "{} columns declared but the input has {field_count} fields",
                self.columns.len()
            ))
            .with_hint("Declare one column per field or omit the column list."));
        }

        let candidates: Vec<String> = if has_headers && found {
            self.assembler
                .record()
                .iter()
                .enumerate()
                .map(|(index, name)| match name {
                    Some(name) if !name.trim().is_empty() => name.to_string(),
                    _ => self.default_name(index),
                })
                .collect()
        } else {
            (0..field_count).map(|index| self.default_name(index)).collect()
        };
        let candidates = candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| match self.columns.get(index) {
                Some(column) if !column.name.is_empty() => column.name.clone(),
                _ => candidate,
            })
            .collect();
        let (names, index) = self.dedupe_headers(candidates)?;
        for (position, name) in names.iter().enumerate() {
            if position < self.columns.len() {
                self.columns.rename(position, name.clone())?;
            } else {
                self.columns.push(Column::new(name.clone(), ColumnKind::Text))?;
            }
        }
        self.header_names = names;
        self.header_index = index;

        self.field_count = field_count;
        self.initialized = true;
        self.pending_first = found && !has_headers;
        self.eof = !found;
        tracing::debug!(
            field_count,
            has_headers,
            headers = ?self.header_names,
            "reader initialized"
        );
        Ok(())
    }

    fn default_name(&self, index: usize) -> String {
        format!("{}{index}", self.options.default_header_name)
    }

    /// Applies the duplicate-header policy without touching reader state.
    fn dedupe_headers(
        &mut self,
        candidates: Vec<String>,
    ) -> Result<(Vec<String>, HashMap<String, usize>), Error> {
        let mut names = Vec::with_capacity(candidates.len());
        let mut header_index = HashMap::new();
        for (index, mut name) in candidates.into_iter().enumerate() {
            if let Some(&existing) = header_index.get(&header_key(&name)) {
                let substitute = match self.on_duplicate_header.as_mut() {
                    Some(hook) => hook(&name, index, existing),
                    None => None,
                };
                match substitute {
                    Some(substitute) if !header_index.contains_key(&header_key(&substitute)) => {
                        tracing::debug!(%name, %substitute, index, "duplicate header renamed");
                        name = substitute;
                    }
                    _ => {
                        return Err(Error::new(ErrorKind::DuplicateHeader)
                            .with_message(format!(
                                "duplicate header `{name}` at field {index} (first seen at field {existing})"
                            ))
                            .with_field(index)
                            .with_hint("Rename the column or install a duplicate header handler."));
                    }
                }
            }
            header_index.insert(header_key(&name), index);
            names.push(name);
        }
        Ok((names, header_index))
    }

    /// Advances to the next record. Returns `false` at end of stream.
    pub fn read_next_record(&mut self) -> Result<bool, Error> {
        self.ensure_open()?;
        self.initialize()?;
        self.version += 1;
        if self.pending_first {
            self.pending_first = false;
            self.record_index += 1;
            self.has_record = true;
            return Ok(true);
        }
        self.has_record = false;
        if self.eof {
            return Ok(false);
        }
        if self.assembler.read_record(self.record_index + 1)? {
            self.record_index += 1;
            self.has_record = true;
            Ok(true)
        } else {
            self.eof = true;
            tracing::debug!(records = self.record_index + 1, "end of stream");
            Ok(false)
        }
    }

    /// Zero-based index of the current data record; -1 before the first read.
    pub fn current_record_index(&self) -> i64 {
        self.record_index
    }

    pub fn field_count(&self) -> Result<usize, Error> {
        self.ensure_initialized()?;
        Ok(self.field_count)
    }

    pub fn has_headers(&self) -> bool {
        self.options.has_headers
    }

    /// Resolved names: header row, declared columns, or synthesized defaults.
    pub fn header_names(&self) -> Result<&[String], Error> {
        self.ensure_initialized()?;
        Ok(&self.header_names)
    }

    pub fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }

    pub fn set_column_default(&mut self, index: usize, value: Option<Value>) -> Result<(), Error> {
        self.columns.set_default(index, value)
    }

    /// Forces every read of column `index` to yield `value` until cleared.
    pub fn set_column_override(&mut self, index: usize, value: Option<Value>) -> Result<(), Error> {
        self.columns.set_override(index, value)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.initialized && self.options.has_headers && self.header_index.contains_key(&header_key(name))
    }

    /// Case-insensitive header lookup.
    pub fn field_index(&self, name: &str) -> Result<usize, Error> {
        self.ensure_initialized()?;
        if !self.options.has_headers {
            return Err(invalid_state("reader has no headers; address fields by index"));
        }
        self.header_index
            .get(&header_key(name))
            .copied()
            .ok_or_else(|| invalid_config(format!("field `{name}` not found")))
    }

    pub fn record(&self) -> Result<&Record, Error> {
        self.ensure_open()?;
        if !self.has_record {
            return Err(invalid_state("no current record; call read_next_record first"));
        }
        Ok(self.assembler.record())
    }

    /// Raw text of field `index`; `None` for a null field.
    pub fn field(&self, index: usize) -> Result<Option<&str>, Error> {
        let record = self.record()?;
        check_index(index, record.len())?;
        Ok(record.get(index))
    }

    pub fn field_by_name(&self, name: &str) -> Result<Option<&str>, Error> {
        self.record()?;
        let index = self.field_index(name)?;
        self.field(index)
    }

    pub fn is_null(&self, index: usize) -> Result<bool, Error> {
        let raw = self.field(index)?;
        Ok(is_null_text(raw, self.options.null_value.as_deref()))
    }

    /// Typed value of field `index` per its column definition.
    pub fn value(&self, index: usize) -> Result<Converted, Error> {
        let raw = self.field(index)?;
        typed_value(&self.columns, &self.options, index, raw)
    }

    pub fn value_by_name(&self, name: &str) -> Result<Converted, Error> {
        self.record()?;
        let index = self.field_index(name)?;
        self.value(index)
    }

    /// Copies the current record into `dest` starting at `start`.
    pub fn copy_current_record_to(
        &self,
        dest: &mut [Option<String>],
        start: usize,
    ) -> Result<(), Error> {
        let record = self.record()?;
        copy_record(record, dest, start)
    }

    pub fn missing_field_flag(&self) -> bool {
        self.has_record && self.assembler.missing_field_flag()
    }

    pub fn parse_error_flag(&self) -> bool {
        self.assembler.parse_error_flag()
    }

    /// True once the input is exhausted and no buffered record remains.
    pub fn end_of_stream(&self) -> bool {
        self.closed || (self.eof && !self.pending_first)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases the source. Further access fails with an invalid-state error.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.has_record = false;
        self.version += 1;
        self.assembler.close();
        tracing::debug!(records = self.record_index + 1, "reader closed");
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed {
            return Err(invalid_state("reader is closed"));
        }
        if self.failed {
            return Err(invalid_state("reader failed to initialize")
                .with_hint("Header and configuration errors are fatal; open a new reader."));
        }
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), Error> {
        self.ensure_open()?;
        if !self.initialized {
            return Err(invalid_state("reader is not initialized; read a record first"));
        }
        Ok(())
    }
}

impl<S: CharSource> Drop for CsvReader<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: CharSource> RecordStream for CsvReader<S> {
    fn advance(&mut self) -> Result<bool, Error> {
        self.read_next_record()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn current(&self) -> Result<&Record, Error> {
        self.record()
    }
}

fn header_key(name: &str) -> String {
    name.to_lowercase()
}

pub(crate) fn check_index(index: usize, len: usize) -> Result<(), Error> {
    if index >= len {
        return Err(invalid_config(format!(
            "field index {index} is out of range (field count {len})"
        ))
        .with_field(index));
    }
    Ok(())
}

pub(crate) fn is_null_text(raw: Option<&str>, null_value: Option<&str>) -> bool {
    match raw {
        None => true,
        Some(text) => null_value == Some(text),
    }
}

pub(crate) fn copy_record(
    record: &Record,
    dest: &mut [Option<String>],
    start: usize,
) -> Result<(), Error> {
    let end = start
        .checked_add(record.len())
        .filter(|end| *end <= dest.len())
        .ok_or_else(|| {
            invalid_config(format!(
                "destination holds {} slots; {} needed from offset {start}",
                dest.len(),
                record.len()
            ))
        })?;
    for (slot, field) in dest[start..end].iter_mut().zip(record.fields()) {
        slot.clone_from(field);
    }
    Ok(())
}

/// Override, then null/empty defaults, then conversion.
pub(crate) fn typed_value(
    columns: &ColumnRegistry,
    options: &ReaderOptions,
    index: usize,
    raw: Option<&str>,
) -> Result<Converted, Error> {
    let column = columns
        .get(index)
        .ok_or_else(|| invalid_config(format!("column index {index} is out of range")))?;
    if let Some(value) = &column.override_value {
        return Ok(Converted::ok(value.clone()));
    }
    let null = is_null_text(raw, options.null_value.as_deref());
    if null || raw == Some("") {
        if options.use_column_defaults {
            if let Some(value) = &column.default_value {
                return Ok(Converted::ok(value.clone()));
            }
        }
        if null {
            return Ok(Converted::ok(Value::Null));
        }
    }
    columns.convert(index, raw.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::CsvReader;
    use crate::core::column::{Column, ColumnKind};
    use crate::core::convert::Value;
    use crate::core::error::ErrorKind;
    use crate::core::options::{ReaderHooks, ReaderOptions};
    use crate::core::source::CharSource;

    fn reader(text: &str) -> CsvReader<crate::core::source::StrSource> {
        CsvReader::from_text(text, ReaderOptions::new()).expect("reader")
    }

    #[test]
    fn access_before_first_read_is_invalid_state() {
        let reader = reader("a,b\n1,2\n");
        assert_eq!(reader.field(0).unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(reader.field_count().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(reader.header_names().unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn initialize_resolves_headers_without_consuming_data() {
        let mut reader = reader("Name,Age\nann,3\n");
        reader.initialize().expect("init");
        assert_eq!(reader.header_names().expect("names"), ["Name", "Age"]);
        assert_eq!(reader.field_index("age").expect("index"), 1);
        assert!(reader.read_next_record().expect("read"));
        assert_eq!(reader.field_by_name("NAME").expect("name"), Some("ann"));
    }

    #[test]
    fn blank_headers_get_default_names() {
        let mut reader = reader("a,,c\n1,2,3\n");
        reader.initialize().expect("init");
        assert_eq!(reader.header_names().expect("names"), ["a", "Column1", "c"]);
    }

    #[test]
    fn duplicate_headers_fail_without_handler() {
        let mut reader = reader("id,ID\n1,2\n");
        let err = reader.read_next_record().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateHeader);
        assert_eq!(err.field(), Some(1));
    }

    #[test]
    fn duplicate_header_handler_renames() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        let hooks = ReaderHooks::new().on_duplicate_header(move |name, index, existing| {
            sink.borrow_mut().push((name.to_string(), index, existing));
            Some(format!("{name}_{index}"))
        });
        let mut reader =
            CsvReader::with_hooks(crate::core::source::StrSource::new("x,y,x\n1,2,3\n"), ReaderOptions::new(), hooks)
                .expect("reader");
        assert!(reader.read_next_record().expect("read"));
        assert_eq!(reader.header_names().expect("names"), ["x", "y", "x_2"]);
        assert_eq!(reader.field_by_name("x_2").expect("field"), Some("3"));
        assert_eq!(reader.field_by_name("X").expect("field"), Some("1"));
        assert_eq!(*calls.borrow(), vec![("x".to_string(), 2, 0)]);
    }

    #[test]
    fn failed_initialization_is_latched() {
        let mut reader = reader("id,ID\n1,2\n3,4\n");
        assert_eq!(reader.read_next_record().unwrap_err().kind(), ErrorKind::DuplicateHeader);
        assert_eq!(reader.read_next_record().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(reader.initialize().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(reader.header_names().unwrap_err().kind(), ErrorKind::InvalidState);
        assert!(reader.columns().is_empty());
        assert!(!reader.has_header("id"));

        let options = ReaderOptions::new().with_columns(vec![Column::new("a", ColumnKind::Text)]);
        let mut reader = CsvReader::from_text("a,b\n1,2\n", options).expect("reader");
        assert_eq!(reader.read_next_record().unwrap_err().kind(), ErrorKind::InvalidConfig);
        assert_eq!(reader.read_next_record().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(reader.columns().len(), 1);
    }

    #[test]
    fn handler_returning_duplicate_still_fails() {
        let hooks = ReaderHooks::new().on_duplicate_header(|name, _, _| Some(name.to_uppercase()));
        let mut reader = CsvReader::with_hooks(
            crate::core::source::StrSource::new("x,x\n"),
            ReaderOptions::new(),
            hooks,
        )
        .expect("reader");
        assert_eq!(reader.initialize().unwrap_err().kind(), ErrorKind::DuplicateHeader);
    }

    #[test]
    fn headerless_input_synthesizes_names_and_keeps_first_row() {
        let options = ReaderOptions::new().with_headers(false);
        let mut reader = CsvReader::from_text("1,2\n3,4\n", options).expect("reader");
        reader.initialize().expect("init");
        assert_eq!(reader.header_names().expect("names"), ["Column0", "Column1"]);
        assert_eq!(reader.field_index("Column0").unwrap_err().kind(), ErrorKind::InvalidState);
        assert!(reader.read_next_record().expect("first"));
        assert_eq!(reader.current_record_index(), 0);
        assert_eq!(reader.field(1).expect("field"), Some("2"));
        assert!(reader.read_next_record().expect("second"));
        assert_eq!(reader.field(0).expect("field"), Some("3"));
        assert!(!reader.read_next_record().expect("end"));
    }

    #[test]
    fn unknown_name_and_bad_index_are_invalid_config() {
        let mut reader = reader("a\n1\n");
        reader.read_next_record().expect("read");
        assert_eq!(reader.field_by_name("b").unwrap_err().kind(), ErrorKind::InvalidConfig);
        assert_eq!(reader.field(1).unwrap_err().kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn copy_requires_room() {
        let mut reader = reader("a,b\n1,2\n");
        reader.read_next_record().expect("read");
        let mut dest = vec![None; 3];
        reader.copy_current_record_to(&mut dest, 1).expect("copy");
        assert_eq!(dest, vec![None, Some("1".to_string()), Some("2".to_string())]);
        let err = reader.copy_current_record_to(&mut dest, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn declared_columns_drive_typed_values() {
        let options = ReaderOptions::new().with_columns(vec![
            Column::new("", ColumnKind::Int32),
            Column::new("flag", ColumnKind::Boolean).with_default(Value::Bool(false)),
        ]);
        let options = ReaderOptions {
            use_column_defaults: true,
            ..options
        };
        let mut reader = CsvReader::from_text("n,f\n42,\n", options).expect("reader");
        assert!(reader.read_next_record().expect("read"));
        assert_eq!(reader.header_names().expect("names"), ["n", "flag"]);
        assert_eq!(reader.value(0).expect("n").value, Value::Int(42));
        assert_eq!(reader.value_by_name("flag").expect("flag").value, Value::Bool(false));
    }

    #[test]
    fn conversion_failure_is_reported_not_raised() {
        let options =
            ReaderOptions::new().with_columns(vec![Column::new("n", ColumnKind::UInt8)]);
        let mut reader = CsvReader::from_text("n\n300\n", options).expect("reader");
        reader.read_next_record().expect("read");
        assert!(!reader.value(0).expect("value").ok);
    }

    #[test]
    fn declared_column_count_must_match() {
        let options = ReaderOptions::new().with_columns(vec![Column::new("a", ColumnKind::Text)]);
        let mut reader = CsvReader::from_text("a,b\n", options).expect("reader");
        assert_eq!(reader.initialize().unwrap_err().kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn override_wins_until_cleared() {
        let mut reader = reader("a,b\n1,2\n");
        assert!(!reader.has_header("A"));
        reader.read_next_record().expect("read");
        assert!(reader.has_header("A"));
        reader
            .set_column_override(1, Some(Value::Text("fixed".to_string())))
            .expect("override");
        assert_eq!(reader.value(1).expect("value").value, Value::Text("fixed".to_string()));
        reader.set_column_override(1, None).expect("clear");
        assert_eq!(reader.value(1).expect("value").value, Value::Text("2".to_string()));
        assert_eq!(
            reader.set_column_default(5, None).unwrap_err().kind(),
            ErrorKind::InvalidConfig
        );
    }

    #[test]
    fn null_value_text_reads_as_null() {
        let options = ReaderOptions {
            null_value: Some("NULL".to_string()),
            ..ReaderOptions::new()
        };
        let mut reader = CsvReader::from_text("a,b\nNULL,x\n", options).expect("reader");
        reader.read_next_record().expect("read");
        assert!(reader.is_null(0).expect("null"));
        assert!(!reader.is_null(1).expect("not null"));
        assert_eq!(reader.value(0).expect("value").value, Value::Null);
    }

    #[test]
    fn close_is_idempotent_and_releases_source() {
        struct Probe(Rc<RefCell<u32>>);
        impl CharSource for Probe {
            fn read_chars(
                &mut self,
                _buf: &mut Vec<char>,
                _size_hint: usize,
            ) -> Result<usize, crate::core::error::Error> {
                Ok(0)
            }
            fn close(&mut self) {
                *self.0.borrow_mut() += 1;
            }
        }
        let closes = Rc::new(RefCell::new(0));
        let mut reader =
            CsvReader::new(Probe(Rc::clone(&closes)), ReaderOptions::new()).expect("reader");
        reader.close();
        reader.close();
        assert_eq!(reader.read_next_record().unwrap_err().kind(), ErrorKind::InvalidState);
        drop(reader);
        assert_eq!(*closes.borrow(), 1);
    }

    #[test]
    fn empty_input_has_no_records() {
        let mut reader = reader("");
        assert!(!reader.read_next_record().expect("read"));
        assert!(reader.end_of_stream());
        assert_eq!(reader.field_count().expect("count"), 0);
    }
}
