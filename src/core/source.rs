// Character sources feeding the buffer window: in-memory text and UTF-8 byte readers.
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::core::error::{Error, ErrorKind};

const MAX_CHUNK_BYTES: usize = 64 * 1024;

/// Pull interface consumed exclusively by the buffer window.
pub trait CharSource {
    /// Appends up to `size_hint` chars to `buf` and returns how many were appended.
    /// Zero means the stream is exhausted.
    fn read_chars(&mut self, buf: &mut Vec<char>, size_hint: usize) -> Result<usize, Error>;

    /// Releases the underlying handle. Called at most once by the owning reader.
    fn close(&mut self) {}
}

impl<S: CharSource + ?Sized> CharSource for Box<S> {
    fn read_chars(&mut self, buf: &mut Vec<char>, size_hint: usize) -> Result<usize, Error> {
        (**self).read_chars(buf, size_hint)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[derive(Clone, Debug)]
pub struct StrSource {
    chars: Vec<char>,
    pos: usize,
}

impl StrSource {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self {
            chars: text.as_ref().chars().collect(),
            pos: 0,
        }
    }
}

impl CharSource for StrSource {
    fn read_chars(&mut self, buf: &mut Vec<char>, size_hint: usize) -> Result<usize, Error> {
        let take = size_hint.min(self.chars.len() - self.pos);
        buf.extend_from_slice(&self.chars[self.pos..self.pos + take]);
        self.pos += take;
        Ok(take)
    }
}

/// Decodes UTF-8 from any byte reader; invalid sequences become U+FFFD.
#[derive(Debug)]
pub struct ReadSource<R> {
    inner: Option<R>,
    pending: Vec<u8>,
    chunk: Vec<u8>,
    eof: bool,
}

impl ReadSource<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to open {}", path.display()))
                .with_source(err)
        })?;
        Ok(Self::new(file))
    }
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: Some(inner),
            pending: Vec::new(),
            chunk: Vec::new(),
            eof: false,
        }
    }

    fn fill_pending(&mut self, size_hint: usize) -> Result<(), Error> {
        let Some(inner) = self.inner.as_mut() else {
            self.eof = true;
            return Ok(());
        };
        self.chunk.resize(size_hint.clamp(4, MAX_CHUNK_BYTES), 0);
        loop {
            match inner.read(&mut self.chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(read) => {
                    self.pending.extend_from_slice(&self.chunk[..read]);
                    return Ok(());
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(Error::new(ErrorKind::Io)
                        .with_message("failed to read csv input")
                        .with_source(err));
                }
            }
        }
    }

    fn decode_pending(&mut self, buf: &mut Vec<char>, size_hint: usize) -> usize {
        let mut produced = 0;
        let mut offset = 0;
        while produced < size_hint && offset < self.pending.len() {
            let (ch, size) = bstr::decode_utf8(&self.pending[offset..]);
            match ch {
                Some(ch) => {
                    buf.push(ch);
                    offset += size;
                }
                // A truncated sequence at the tail may complete on the next read.
                None if offset + size == self.pending.len() && !self.eof => break,
                None => {
                    buf.push(char::REPLACEMENT_CHARACTER);
                    offset += size.max(1);
                }
            }
            produced += 1;
        }
        self.pending.drain(..offset);
        produced
    }
}

impl<R: Read> CharSource for ReadSource<R> {
    fn read_chars(&mut self, buf: &mut Vec<char>, size_hint: usize) -> Result<usize, Error> {
        loop {
            let produced = self.decode_pending(buf, size_hint);
            if produced > 0 || self.eof {
                return Ok(produced);
            }
            self.fill_pending(size_hint)?;
        }
    }

    fn close(&mut self) {
        self.inner = None;
        self.pending.clear();
    }
}
