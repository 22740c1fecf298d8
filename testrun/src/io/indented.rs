//! Output sink that indents every line it writes.

use std::io::{self, Write};

/// Writes text with the current indentation applied at the start of each
/// non-empty line. Blank lines carry no indentation.
pub struct IndentedWriter<W: Write> {
    inner: W,
    unit: String,
    level: usize,
    at_line_start: bool,
}

impl<W: Write> IndentedWriter<W> {
    pub fn new(inner: W, indent_width: usize) -> Self {
        Self {
            inner,
            unit: " ".repeat(indent_width),
            level: 0,
            at_line_start: true,
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn increase(&mut self) {
        self.level += 1;
    }

    /// Saturates at zero.
    pub fn decrease(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    /// True when nothing has been written on the current line.
    pub fn at_line_start(&self) -> bool {
        self.at_line_start
    }

    pub fn write(&mut self, text: &str) -> io::Result<()> {
        let mut lines = text.split('\n').peekable();
        while let Some(line) = lines.next() {
            if !line.is_empty() {
                if self.at_line_start {
                    for _ in 0..self.level {
                        self.inner.write_all(self.unit.as_bytes())?;
                    }
                    self.at_line_start = false;
                }
                self.inner.write_all(line.as_bytes())?;
            }
            if lines.peek().is_some() {
                self.inner.write_all(b"\n")?;
                self.at_line_start = true;
            }
        }
        Ok(())
    }

    pub fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.write(text)?;
        self.write("\n")
    }

    /// Terminate the current line if anything was written on it.
    pub fn finish_line(&mut self) -> io::Result<()> {
        if self.at_line_start {
            return Ok(());
        }
        self.write("\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Duplicates everything written to `primary` into `copy` (the log file).
pub struct Tee<A: Write, B: Write> {
    primary: A,
    copy: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    pub fn new(primary: A, copy: B) -> Self {
        Self { primary, copy }
    }

    pub fn into_parts(self) -> (A, B) {
        (self.primary, self.copy)
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.primary.write_all(buf)?;
        self.copy.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.copy.flush()
    }
}
