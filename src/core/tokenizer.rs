// Per-field scanning state machine over the buffer window.
use crate::core::buffer::CharBuffer;
use crate::core::error::Error;
use crate::core::options::{ReaderOptions, TrimmingOptions};
use crate::core::source::CharSource;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Dialect {
    pub delimiter: char,
    pub quote: char,
    pub escape: char,
    pub comment: Option<char>,
    pub trimming: TrimmingOptions,
    pub skip_empty_lines: bool,
    pub max_quoted_len: Option<usize>,
}

impl Dialect {
    pub fn from_options(options: &ReaderOptions) -> Self {
        Self {
            delimiter: options.delimiter,
            quote: options.quote,
            escape: options.escape,
            comment: options.comment,
            trimming: options.trimming,
            skip_empty_lines: options.skip_empty_lines,
            max_quoted_len: options.max_quoted_field_length,
        }
    }
}

/// How a field ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct FieldEnd {
    /// A line end or the end of the stream follows; the line end is left unconsumed.
    pub end_of_record: bool,
    pub quoted: bool,
    /// The quoted value spans a line break.
    pub crossed_line: bool,
}

#[derive(Debug)]
pub(crate) enum Fault {
    Malformed(String),
    Fatal(Error),
}

impl From<Error> for Fault {
    fn from(err: Error) -> Self {
        Fault::Fatal(err)
    }
}

#[derive(Debug)]
pub(crate) struct Tokenizer<S> {
    buffer: CharBuffer<S>,
    dialect: Dialect,
}

impl<S: CharSource> Tokenizer<S> {
    pub fn new(buffer: CharBuffer<S>, dialect: Dialect) -> Self {
        Self { buffer, dialect }
    }

    fn is_newline(&self, c: char) -> bool {
        c == '\n' || (c == '\r' && self.dialect.delimiter != '\r')
    }

    /// Skips comment lines and, when configured, empty lines.
    /// Returns `false` once the stream is exhausted.
    pub fn skip_ignorable_lines(&mut self) -> Result<bool, Error> {
        loop {
            match self.buffer.peek()? {
                None => return Ok(false),
                Some(c) if Some(c) == self.dialect.comment => self.skip_line()?,
                Some(c) if self.dialect.skip_empty_lines && self.is_newline(c) => {
                    self.consume_line_end()?
                }
                Some(_) => return Ok(true),
            }
        }
    }

    /// Discards everything up to and including the next line end.
    pub fn skip_line(&mut self) -> Result<(), Error> {
        loop {
            match self.buffer.peek()? {
                None => return Ok(()),
                Some(c) if self.is_newline(c) => return self.consume_line_end(),
                Some(_) => self.buffer.bump(),
            }
        }
    }

    /// Consumes one line end; CRLF counts as a single line end.
    pub fn consume_line_end(&mut self) -> Result<(), Error> {
        match self.buffer.peek()? {
            Some('\n') => self.buffer.bump(),
            Some('\r') if self.dialect.delimiter != '\r' => {
                self.buffer.bump();
                if self.buffer.peek()? == Some('\n') {
                    self.buffer.bump();
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Scans one field into `out`, consuming its trailing delimiter.
    pub fn read_field(&mut self, out: &mut String) -> Result<FieldEnd, Fault> {
        if self.dialect.trimming.trims_unquoted() {
            self.skip_blanks()?;
        }
        match self.buffer.peek()? {
            None => Ok(FieldEnd {
                end_of_record: true,
                quoted: false,
                crossed_line: false,
            }),
            Some(c) if c == self.dialect.quote => {
                self.buffer.bump();
                self.read_quoted(out)
            }
            Some(_) => self.read_unquoted(out),
        }
    }

    fn read_unquoted(&mut self, out: &mut String) -> Result<FieldEnd, Fault> {
        let mut start = self.buffer.pos();
        let end_of_record = loop {
            if self.buffer.is_exhausted() {
                out.extend(self.buffer.span(start));
                if !self.buffer.refill()? {
                    break true;
                }
                start = 0;
                continue;
            }
            let c = self.buffer.current();
            if c == self.dialect.delimiter {
                out.extend(self.buffer.span(start));
                self.buffer.bump();
                break false;
            }
            if self.is_newline(c) {
                out.extend(self.buffer.span(start));
                break true;
            }
            self.buffer.bump();
        };
        if self.dialect.trimming.trims_unquoted() {
            trim_blanks(out, self.dialect.delimiter);
        }
        Ok(FieldEnd {
            end_of_record,
            quoted: false,
            crossed_line: false,
        })
    }

    fn read_quoted(&mut self, out: &mut String) -> Result<FieldEnd, Fault> {
        let quote = self.dialect.quote;
        let escape = self.dialect.escape;
        let mut len = 0usize;
        let mut crossed_line = false;
        let mut start = self.buffer.pos();
        loop {
            if self.buffer.is_exhausted() {
                len += self.flush(out, start);
                if !self.buffer.refill()? {
                    return Err(unterminated());
                }
                start = 0;
                continue;
            }
            let c = self.buffer.current();
            if c == quote && escape == quote {
                len += self.flush(out, start);
                self.buffer.bump();
                if self.buffer.peek()? != Some(quote) {
                    break;
                }
                out.push(quote);
                len += 1;
                self.buffer.bump();
                start = self.buffer.pos();
            } else if c == quote {
                len += self.flush(out, start);
                self.buffer.bump();
                break;
            } else if c == escape {
                len += self.flush(out, start);
                self.buffer.bump();
                match self.buffer.peek()? {
                    Some(next) if next == quote || next == escape => {
                        out.push(next);
                        self.buffer.bump();
                    }
                    // Not an escape sequence: keep the escape char and rescan `next`.
                    Some(_) => out.push(escape),
                    None => return Err(unterminated()),
                }
                len += 1;
                start = self.buffer.pos();
            } else {
                if c == '\n' || c == '\r' {
                    crossed_line = true;
                }
                self.buffer.bump();
            }
            if let Some(max) = self.dialect.max_quoted_len {
                if len + (self.buffer.pos() - start) > max {
                    return Err(Fault::Malformed(format!(
                        "quoted field exceeds the maximum length of {max}"
                    )));
                }
            }
        }

        if self.dialect.trimming.trims_quoted() {
            trim_blanks(out, self.dialect.delimiter);
        }
        self.skip_blanks()?;
        let end_of_record = match self.buffer.peek()? {
            None => true,
            Some(c) if c == self.dialect.delimiter => {
                self.buffer.bump();
                false
            }
            Some(c) if self.is_newline(c) => true,
            Some(c) => {
                return Err(Fault::Malformed(format!(
                    "unexpected character {c:?} after closing quote"
                )));
            }
        };
        Ok(FieldEnd {
            end_of_record,
            quoted: true,
            crossed_line,
        })
    }

    /// Appends the pending span to `out`; must run before any refill.
    fn flush(&self, out: &mut String, start: usize) -> usize {
        let span = self.buffer.span(start);
        out.extend(span);
        span.len()
    }

    fn skip_blanks(&mut self) -> Result<(), Error> {
        while let Some(c) = self.buffer.peek()? {
            if !is_blank(c, self.dialect.delimiter) {
                break;
            }
            self.buffer.bump();
        }
        Ok(())
    }

    /// Window content and cursor position, for parse-error reports.
    pub fn snapshot(&self) -> (String, usize) {
        (self.buffer.snapshot(), self.buffer.pos())
    }

    pub fn close(&mut self) {
        self.buffer.close_source();
    }
}

fn unterminated() -> Fault {
    Fault::Malformed("quoted field is not terminated".to_string())
}

/// Spaces and tabs, plus Unicode space separators beyond Latin-1; never the delimiter.
pub(crate) fn is_blank(c: char, delimiter: char) -> bool {
    if c == delimiter {
        return false;
    }
    if u32::from(c) <= 0xFF {
        c == ' ' || c == '\t'
    } else {
        c.is_whitespace() && c != '\u{2028}' && c != '\u{2029}'
    }
}

fn trim_blanks(value: &mut String, delimiter: char) {
    let end = value
        .trim_end_matches(|c| is_blank(c, delimiter))
        .len();
    value.truncate(end);
    let start = value.len()
        - value
            .trim_start_matches(|c| is_blank(c, delimiter))
            .len();
    value.drain(..start);
}
