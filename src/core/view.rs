// Read-only indexed, sortable, searchable view over a cached reader.
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::core::cache::CachedCsvReader;
use crate::core::column::ColumnKind;
use crate::core::error::{Error, ErrorKind, invalid_config};
use crate::core::record::Record;
use crate::core::source::CharSource;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Orders records by one field using ordinal string comparison; nulls sort first.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecordComparer {
    column: usize,
    direction: SortDirection,
}

impl RecordComparer {
    pub fn new(column: usize, direction: SortDirection) -> Self {
        Self { column, direction }
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn compare(&self, left: &Record, right: &Record) -> Ordering {
        let ordering = left.get(self.column).cmp(&right.get(self.column));
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Per-field metadata exposed to tabular consumers.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub ordinal: usize,
    pub kind: ColumnKind,
}

impl FieldDescriptor {
    pub fn value<'r>(&self, record: &'r Record) -> Option<&'r str> {
        record.get(self.ordinal)
    }
}

/// Positional access over the records of a [`CachedCsvReader`].
///
/// Unsorted access reads ahead lazily. Sorting or taking the length drains
/// the reader into the cache first. Sorting permutes an index vector; cached
/// records are never reordered.
pub struct RecordView<'a, S: CharSource> {
    reader: &'a mut CachedCsvReader<S>,
    order: Option<Vec<usize>>,
    comparer: Option<RecordComparer>,
}

impl<'a, S: CharSource> RecordView<'a, S> {
    pub fn new(reader: &'a mut CachedCsvReader<S>) -> Self {
        Self {
            reader,
            order: None,
            comparer: None,
        }
    }

    pub fn len(&mut self) -> Result<usize, Error> {
        self.reader.fill_all()?;
        Ok(self.reader.cached_len())
    }

    pub fn is_empty(&mut self) -> Result<bool, Error> {
        if self.reader.cached_len() > 0 {
            return Ok(false);
        }
        Ok(!self.reader.fill_to(0)?)
    }

    pub fn get(&mut self, index: usize) -> Result<&Record, Error> {
        let cache_index = match &self.order {
            Some(order) => *order.get(index).ok_or_else(|| out_of_range(index))?,
            None => {
                if !self.reader.fill_to(index)? {
                    return Err(out_of_range(index));
                }
                index
            }
        };
        self.reader
            .cached_records()
            .get(cache_index)
            .ok_or_else(|| out_of_range(index))
    }

    /// Stable sort by `column`; replaces any previous sort.
    pub fn sort(&mut self, column: usize, direction: SortDirection) -> Result<(), Error> {
        self.check_column(column)?;
        self.reader.fill_all()?;
        let comparer = RecordComparer::new(column, direction);
        let records = self.reader.cached_records();
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&left, &right| comparer.compare(&records[left], &records[right]));
        tracing::debug!(column, ?direction, records = order.len(), "view sorted");
        self.order = Some(order);
        self.comparer = Some(comparer);
        Ok(())
    }

    pub fn sort_by_name(&mut self, name: &str, direction: SortDirection) -> Result<(), Error> {
        self.reader.initialize()?;
        let column = self.reader.field_index(name)?;
        self.sort(column, direction)
    }

    pub fn remove_sort(&mut self) {
        self.order = None;
        self.comparer = None;
    }

    pub fn is_sorted(&self) -> bool {
        self.comparer.is_some()
    }

    pub fn sort_column(&self) -> Option<usize> {
        self.comparer.map(|comparer| comparer.column())
    }

    pub fn sort_direction(&self) -> Option<SortDirection> {
        self.comparer.map(|comparer| comparer.direction())
    }

    /// View position of the first record whose field equals `value` exactly.
    pub fn find(&mut self, column: usize, value: &str) -> Result<Option<usize>, Error> {
        self.check_column(column)?;
        if let Some(order) = &self.order {
            let records = self.reader.cached_records();
            return Ok(order
                .iter()
                .position(|&index| records[index].get(column) == Some(value)));
        }
        let mut index = 0;
        while self.reader.fill_to(index)? {
            if self.reader.cached_records()[index].get(column) == Some(value) {
                return Ok(Some(index));
            }
            index += 1;
        }
        Ok(None)
    }

    pub fn find_by_name(&mut self, name: &str, value: &str) -> Result<Option<usize>, Error> {
        self.reader.initialize()?;
        let column = self.reader.field_index(name)?;
        self.find(column, value)
    }

    /// All records in view order.
    pub fn records(&mut self) -> Result<ViewRecords<'_>, Error> {
        self.reader.fill_all()?;
        Ok(ViewRecords {
            records: self.reader.cached_records(),
            order: self.order.as_deref(),
            pos: 0,
        })
    }

    pub fn properties(&mut self) -> Result<Vec<FieldDescriptor>, Error> {
        self.reader.initialize()?;
        Ok(self
            .reader
            .columns()
            .schema()
            .into_iter()
            .map(|schema| FieldDescriptor {
                name: schema.name,
                ordinal: schema.ordinal,
                kind: schema.kind,
            })
            .collect())
    }

    pub fn insert(&mut self, _index: usize, _record: Record) -> Result<(), Error> {
        Err(read_only())
    }

    pub fn remove(&mut self, _index: usize) -> Result<(), Error> {
        Err(read_only())
    }

    pub fn set(&mut self, _index: usize, _record: Record) -> Result<(), Error> {
        Err(read_only())
    }

    pub fn clear(&mut self) -> Result<(), Error> {
        Err(read_only())
    }

    fn check_column(&mut self, column: usize) -> Result<(), Error> {
        self.reader.initialize()?;
        let field_count = self.reader.field_count()?;
        if column >= field_count {
            return Err(invalid_config(format!(
                "column {column} is out of range (field count {field_count})"
            )));
        }
        Ok(())
    }
}

pub struct ViewRecords<'v> {
    records: &'v [Record],
    order: Option<&'v [usize]>,
    pos: usize,
}

impl<'v> Iterator for ViewRecords<'v> {
    type Item = &'v Record;

    fn next(&mut self) -> Option<Self::Item> {
        let index = match self.order {
            Some(order) => *order.get(self.pos)?,
            None => self.pos,
        };
        self.pos += 1;
        self.records.get(index)
    }
}

fn out_of_range(index: usize) -> Error {
    invalid_config(format!("view index {index} is out of range"))
}

fn read_only() -> Error {
    Error::new(ErrorKind::NotSupported)
        .with_message("record view is read-only")
        .with_hint("Read records through the view; edit the source file instead.")
}

#[cfg(test)]
mod tests {
    use super::{RecordComparer, RecordView, SortDirection};
    use crate::core::cache::CachedCsvReader;
    use crate::core::error::ErrorKind;
    use crate::core::options::ReaderOptions;
    use crate::core::policy::MissingFieldAction;
    use crate::core::reader::CsvReader;
    use crate::core::record::Record;
    use crate::core::source::StrSource;

    fn cached(text: &str) -> CachedCsvReader<StrSource> {
        let options =
            ReaderOptions::new().with_missing_field_action(MissingFieldAction::ReplaceByNull);
        CachedCsvReader::new(CsvReader::from_text(text, options).expect("reader"))
    }

    fn column(view: &mut RecordView<'_, StrSource>, index: usize) -> Vec<Option<String>> {
        view.records()
            .expect("records")
            .map(|record| record.get(index).map(str::to_string))
            .collect()
    }

    #[test]
    fn comparer_puts_nulls_first() {
        let comparer = RecordComparer::new(0, SortDirection::Ascending);
        let null = Record::new(vec![None]);
        let text = Record::from_strs(&["a"]);
        assert!(comparer.compare(&null, &text).is_lt());
        let descending = RecordComparer::new(0, SortDirection::Descending);
        assert!(descending.compare(&null, &text).is_gt());
    }

    #[test]
    fn sort_is_stable_and_reversible() {
        let mut cache = cached("k,v\nb,1\na,2\nb,3\na,4\n");
        let mut view = RecordView::new(&mut cache);
        view.sort(0, SortDirection::Ascending).expect("sort");
        assert_eq!(
            column(&mut view, 1),
            ["2", "4", "1", "3"].map(|v| Some(v.to_string()))
        );
        assert_eq!(view.sort_column(), Some(0));
        view.remove_sort();
        assert!(!view.is_sorted());
        assert_eq!(
            column(&mut view, 1),
            ["1", "2", "3", "4"].map(|v| Some(v.to_string()))
        );
    }

    #[test]
    fn descending_sort_by_name() {
        let mut cache = cached("k,v\nb,1\nc,2\na,3\n");
        let mut view = RecordView::new(&mut cache);
        view.sort_by_name("K", SortDirection::Descending).expect("sort");
        assert_eq!(view.get(0).expect("first").get(0), Some("c"));
        assert_eq!(view.sort_direction(), Some(SortDirection::Descending));
    }

    #[test]
    fn find_respects_view_order() {
        let mut cache = cached("k,v\nb,1\na,2\n");
        let mut view = RecordView::new(&mut cache);
        assert_eq!(view.find(0, "a").expect("find"), Some(1));
        view.sort(0, SortDirection::Ascending).expect("sort");
        assert_eq!(view.find_by_name("k", "a").expect("find"), Some(0));
        assert_eq!(view.find(0, "zzz").expect("find"), None);
    }

    #[test]
    fn unsorted_get_reads_lazily() {
        let mut cache = cached("k\na\nb\nc\n");
        {
            let mut view = RecordView::new(&mut cache);
            assert_eq!(view.get(1).expect("get").get(0), Some("b"));
            assert_eq!(view.get(9).unwrap_err().kind(), ErrorKind::InvalidConfig);
        }
        assert_eq!(cache.cached_len(), 3);
    }

    #[test]
    fn null_fields_sort_first() {
        let mut cache = cached("k,v\nx,1\ny\n");
        let mut view = RecordView::new(&mut cache);
        view.sort(1, SortDirection::Ascending).expect("sort");
        assert_eq!(view.get(0).expect("first").get(0), Some("y"));
    }

    #[test]
    fn mutation_is_not_supported() {
        let mut cache = cached("k\na\n");
        let mut view = RecordView::new(&mut cache);
        assert_eq!(view.clear().unwrap_err().kind(), ErrorKind::NotSupported);
        assert_eq!(view.remove(0).unwrap_err().kind(), ErrorKind::NotSupported);
        assert_eq!(
            view.insert(0, Record::from_strs(&["b"])).unwrap_err().kind(),
            ErrorKind::NotSupported
        );
    }

    #[test]
    fn bad_sort_column_is_invalid_config() {
        let mut cache = cached("k\na\n");
        let mut view = RecordView::new(&mut cache);
        assert_eq!(
            view.sort(3, SortDirection::Ascending).unwrap_err().kind(),
            ErrorKind::InvalidConfig
        );
        let properties = view.properties().expect("properties");
        assert_eq!(properties[0].name, "k");
        assert_eq!(view.len().expect("len"), 1);
    }
}
