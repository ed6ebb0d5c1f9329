//! Purpose: Define the public Rust API boundary for csvcache.
//! Exports: Readers, the replay cache, the sortable view, configuration, and errors.
//! Role: Public, additive-only surface; hides tokenizer and buffer internals.
//! Invariants: This module is the only public path to core types.

pub use crate::core::cache::CachedCsvReader;
pub use crate::core::column::{
    Column, ColumnKind, ColumnRegistry, ColumnSchema, DateStyle, Locale, NumberStyle,
};
pub use crate::core::convert::{Converted, Value};
pub use crate::core::cursor::{RecordCursor, RecordStream, Records};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::options::{
    DEFAULT_BUFFER_SIZE, DEFAULT_HEADER_NAME, DuplicateHeaderHook, MAX_BUFFER_SIZE, ParseErrorHook,
    ReaderHooks, ReaderOptions, TrimmingOptions,
};
pub use crate::core::policy::{MissingFieldAction, ParseError, ParseErrorAction, ParseErrorKind};
pub use crate::core::reader::CsvReader;
pub use crate::core::record::Record;
pub use crate::core::source::{CharSource, ReadSource, StrSource};
pub use crate::core::view::{FieldDescriptor, RecordComparer, RecordView, SortDirection, ViewRecords};
