//! Reassembly of arbitrarily split byte deliveries into complete lines.
//!
//! The transport hands over whatever the connection produced: half a JSON
//! record, three records and a bit, a lone `\n`. [`LineReassembler`] keeps
//! the unterminated tail between deliveries and yields only whole lines.
//!
//! The buffer has a fixed capacity. A delivery that would push it past that
//! capacity empties the buffer and is itself dropped; the caller gets a
//! [`BufferOverflow`] and can keep feeding. Whatever was in flight at that
//! moment is lost. The buffer never grows and never blocks.

use murmur_types::BufferOverflow;

/// Default line buffer capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 8192;

/// Bounded accumulator turning byte deliveries into lines.
#[derive(Debug)]
pub struct LineReassembler {
    buf: Vec<u8>,
    capacity: usize,
}

impl LineReassembler {
    /// Reassembler with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Reassembler holding at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Fixed capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently held (the unterminated tail plus unread lines).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append `chunk` and iterate the complete lines now available.
    ///
    /// Lines come out without their `\n` (and a trailing `\r`, if any).
    /// Empty and whitespace-only lines are skipped. Bytes are released from
    /// the buffer when the returned iterator is dropped, so lines left
    /// unread stay buffered for the next call.
    ///
    /// # Errors
    ///
    /// [`BufferOverflow`] if `buffered + chunk.len()` exceeds the capacity.
    /// The buffer is cleared and `chunk` discarded before returning.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Lines<'_>, BufferOverflow> {
        if self.buf.len() + chunk.len() > self.capacity {
            let overflow = BufferOverflow {
                buffered: self.buf.len(),
                incoming: chunk.len(),
                capacity: self.capacity,
            };
            self.buf.clear();
            return Err(overflow);
        }
        self.buf.extend_from_slice(chunk);
        Ok(Lines {
            buf: &mut self.buf,
            pos: 0,
        })
    }

    /// Drain the unterminated remainder once the byte stream has ended.
    ///
    /// Returns `None` if nothing but whitespace is left.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let line = trim_cr(&rest);
        if is_blank(line) {
            None
        } else {
            Some(String::from_utf8_lossy(line).into_owned())
        }
    }
}

impl Default for LineReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy iterator over the complete lines of a [`LineReassembler`].
#[derive(Debug)]
pub struct Lines<'a> {
    buf: &'a mut Vec<u8>,
    pos: usize,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let rest = &self.buf[self.pos..];
            let newline = rest.iter().position(|&b| b == b'\n')?;
            let line = trim_cr(&rest[..newline]);
            self.pos += newline + 1;
            if !is_blank(line) {
                return Some(String::from_utf8_lossy(line).into_owned());
            }
        }
    }
}

impl Drop for Lines<'_> {
    fn drop(&mut self) {
        self.buf.drain(..self.pos);
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}
