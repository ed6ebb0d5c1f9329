// Version-stamped enumeration over a record stream; the stream itself is never copied.
use crate::core::error::{Error, invalid_state};
use crate::core::record::Record;

/// A source of records with a single current position.
pub trait RecordStream {
    /// Moves to the next record; `false` at end of stream.
    fn advance(&mut self) -> Result<bool, Error>;
    /// Changes whenever the current position changes.
    fn version(&self) -> u64;
    fn current(&self) -> Result<&Record, Error>;

    fn records(&mut self) -> Records<'_, Self>
    where
        Self: Sized,
    {
        Records::new(self)
    }
}

/// Cursor that yields owned record snapshots and detects out-of-band movement
/// of the stream it was created for.
#[derive(Debug)]
pub struct RecordCursor {
    stamp: u64,
    finished: bool,
}

impl RecordCursor {
    pub fn new<T: RecordStream + ?Sized>(stream: &T) -> Self {
        Self {
            stamp: stream.version(),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn next<T: RecordStream + ?Sized>(&mut self, stream: &mut T) -> Result<Option<Record>, Error> {
        if self.finished {
            return Ok(None);
        }
        if stream.version() != self.stamp {
            self.finished = true;
            return Err(invalid_state("record stream moved outside of this enumeration"));
        }
        let advanced = stream.advance().inspect_err(|_| self.finished = true)?;
        self.stamp = stream.version();
        if !advanced {
            self.finished = true;
            return Ok(None);
        }
        Ok(Some(stream.current()?.snapshot()))
    }
}

/// Iterator adapter over [`RecordCursor`]; ends after the first error.
pub struct Records<'a, T: ?Sized> {
    stream: &'a mut T,
    cursor: RecordCursor,
}

impl<'a, T: RecordStream + ?Sized> Records<'a, T> {
    pub fn new(stream: &'a mut T) -> Self {
        let cursor = RecordCursor::new(&*stream);
        Self { stream, cursor }
    }
}

impl<T: RecordStream + ?Sized> Iterator for Records<'_, T> {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next(&mut *self.stream).transpose()
    }
}
