// Replay cache over a forward reader: records are snapshotted once and revisited by index.
use crate::core::column::ColumnRegistry;
use crate::core::convert::Converted;
use crate::core::cursor::{RecordCursor, RecordStream};
use crate::core::error::{Error, invalid_config, invalid_state};
use crate::core::reader::{CsvReader, check_index, copy_record, is_null_text, typed_value};
use crate::core::record::Record;
use crate::core::source::CharSource;

/// Wraps a [`CsvReader`] and keeps every record it has produced.
///
/// The underlying reader is only asked for more input when a read or a
/// `move_to` goes past the highest cached index. Rewinding never touches it.
pub struct CachedCsvReader<S: CharSource> {
    reader: CsvReader<S>,
    records: Vec<Record>,
    cursor: i64,
    version: u64,
}

impl<S: CharSource> CachedCsvReader<S> {
    pub fn new(reader: CsvReader<S>) -> Self {
        Self {
            reader,
            records: Vec::new(),
            cursor: -1,
            version: 0,
        }
    }

    pub fn reader(&self) -> &CsvReader<S> {
        &self.reader
    }

    pub fn into_inner(self) -> CsvReader<S> {
        self.reader
    }

    pub fn initialize(&mut self) -> Result<(), Error> {
        self.reader.initialize()
    }

    pub fn current_record_index(&self) -> i64 {
        self.cursor
    }

    pub fn cached_len(&self) -> usize {
        self.records.len()
    }

    /// Cursor over the cache from the current position onward.
    pub fn records_cursor(&self) -> RecordCursor {
        RecordCursor::new(self)
    }

    pub fn cached_records(&self) -> &[Record] {
        &self.records
    }

    fn fetch_next(&mut self) -> Result<bool, Error> {
        if !self.reader.read_next_record()? {
            return Ok(false);
        }
        self.records.push(self.reader.record()?.snapshot());
        Ok(true)
    }

    /// Grows the cache until `index` is cached; `false` if the stream ends first.
    pub(crate) fn fill_to(&mut self, index: usize) -> Result<bool, Error> {
        self.ensure_open()?;
        while self.records.len() <= index {
            if !self.fetch_next()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn fill_all(&mut self) -> Result<(), Error> {
        self.ensure_open()?;
        while self.fetch_next()? {}
        tracing::debug!(cached = self.records.len(), "cache filled");
        Ok(())
    }

    /// Serves the next cached record, pulling from the reader only past the cache.
    /// At end of stream the cursor stays on the last record.
    pub fn read_next_record(&mut self) -> Result<bool, Error> {
        let next = self.cursor + 1;
        let found = self.fill_to(next as usize)?;
        if found {
            self.cursor = next;
            self.version += 1;
        }
        Ok(found)
    }

    /// Positions on record `index`, reading ahead as needed. `-1` rewinds.
    /// Past the end, the cursor lands on the last record and `false` is returned.
    pub fn move_to(&mut self, index: i64) -> Result<bool, Error> {
        if index < -1 {
            return Err(invalid_config(format!("record index {index} is out of range")));
        }
        if index == -1 {
            self.ensure_open()?;
            self.move_to_start();
            return Ok(true);
        }
        let found = self.fill_to(index as usize)?;
        self.cursor = if found {
            index
        } else {
            self.records.len() as i64 - 1
        };
        self.version += 1;
        Ok(found)
    }

    /// Rewinds before the first record without touching the underlying reader.
    pub fn move_to_start(&mut self) {
        self.cursor = -1;
        self.version += 1;
    }

    /// Drains the underlying reader into the cache and lands on the last record.
    pub fn read_to_end(&mut self) -> Result<(), Error> {
        self.fill_all()?;
        self.cursor = self.records.len() as i64 - 1;
        self.version += 1;
        Ok(())
    }

    pub fn end_of_stream(&self) -> bool {
        self.cursor >= self.records.len() as i64 - 1 && self.reader.end_of_stream()
    }

    pub fn record(&self) -> Result<&Record, Error> {
        self.ensure_open()?;
        usize::try_from(self.cursor)
            .ok()
            .and_then(|index| self.records.get(index))
            .ok_or_else(|| invalid_state("no current record; call read_next_record first"))
    }

    pub fn field(&self, index: usize) -> Result<Option<&str>, Error> {
        let record = self.record()?;
        check_index(index, record.len())?;
        Ok(record.get(index))
    }

    pub fn field_by_name(&self, name: &str) -> Result<Option<&str>, Error> {
        self.record()?;
        let index = self.reader.field_index(name)?;
        self.field(index)
    }

    pub fn field_index(&self, name: &str) -> Result<usize, Error> {
        self.reader.field_index(name)
    }

    pub fn field_count(&self) -> Result<usize, Error> {
        self.reader.field_count()
    }

    pub fn header_names(&self) -> Result<&[String], Error> {
        self.reader.header_names()
    }

    pub fn columns(&self) -> &ColumnRegistry {
        self.reader.columns()
    }

    pub fn is_null(&self, index: usize) -> Result<bool, Error> {
        let raw = self.field(index)?;
        Ok(is_null_text(raw, self.reader.options().null_value.as_deref()))
    }

    pub fn value(&self, index: usize) -> Result<Converted, Error> {
        let raw = self.field(index)?;
        typed_value(self.reader.columns(), self.reader.options(), index, raw)
    }

    pub fn copy_current_record_to(
        &self,
        dest: &mut [Option<String>],
        start: usize,
    ) -> Result<(), Error> {
        copy_record(self.record()?, dest, start)
    }

    /// Closes the underlying reader and drops the cache.
    pub fn close(&mut self) {
        self.reader.close();
        self.records.clear();
        self.cursor = -1;
        self.version += 1;
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.reader.is_closed() {
            return Err(invalid_state("reader is closed"));
        }
        Ok(())
    }
}

impl<S: CharSource> RecordStream for CachedCsvReader<S> {
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
