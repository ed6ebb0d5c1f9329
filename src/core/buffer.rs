// Fixed-size character window over a `CharSource`, replaced wholesale on refill.
use crate::core::error::{Error, invalid_config};
use crate::core::source::CharSource;

const MAX_PREALLOC: usize = 64 * 1024;

/// Positions handed out by the window are only valid until the next `refill`,
/// which discards the previous content instead of shifting it.
#[derive(Debug)]
pub struct CharBuffer<S> {
    source: S,
    chars: Vec<char>,
    capacity: usize,
    pos: usize,
    eof: bool,
    refills: u64,
}

impl<S: CharSource> CharBuffer<S> {
    pub fn new(source: S, capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(invalid_config("buffer size must be greater than zero"));
        }
        Ok(Self {
            source,
            chars: Vec::with_capacity(capacity.min(MAX_PREALLOC)),
            capacity,
            pos: 0,
            eof: false,
            refills: 0,
        })
    }

    /// Replaces the window with up to `capacity` fresh chars.
    /// Returns `false` and latches end-of-stream once the source yields nothing.
    pub fn refill(&mut self) -> Result<bool, Error> {
        if self.eof {
            return Ok(false);
        }
        self.chars.clear();
        self.pos = 0;
        let read = self.source.read_chars(&mut self.chars, self.capacity)?;
        if read == 0 {
            self.eof = true;
            return Ok(false);
        }
        self.refills += 1;
        tracing::trace!(read, refills = self.refills, "buffer refilled");
        Ok(true)
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// True once the source is drained and every buffered char was consumed.
    pub fn at_end(&self) -> bool {
        self.eof && self.is_exhausted()
    }

    /// Next char, refilling the window first when it is spent.
    /// Callers holding a span of the current window must flush it before calling this.
    pub fn peek(&mut self) -> Result<Option<char>, Error> {
        if self.is_exhausted() && !self.refill()? {
            return Ok(None);
        }
        Ok(Some(self.chars[self.pos]))
    }

    /// Char under the cursor; the window must not be exhausted.
    pub fn current(&self) -> char {
        self.chars[self.pos]
    }

    pub fn bump(&mut self) {
        self.pos += 1;
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Chars consumed since `start` in the current window.
    pub fn span(&self, start: usize) -> &[char] {
        &self.chars[start..self.pos]
    }

    pub fn snapshot(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn refills(&self) -> u64 {
        self.refills
    }

    pub fn close_source(&mut self) {
        self.source.close();
        self.chars.clear();
        self.pos = 0;
        self.eof = true;
    }
}
