use std::io::Read;

use memchr::memchr_iter;

use crate::Result;

/// Granularity of reads performed by the marker scanner
pub const SCAN_CHUNK_SIZE: usize = 4096;

/// Byte that starts a FASTA record when found at the beginning of a line
pub const RECORD_MARKER: u8 = b'>';

/// Lightweight scanner yielding the byte offset of every record-start marker
///
/// A marker is a `>` at the very start of the input or immediately after a
/// newline. The input is read in [`SCAN_CHUNK_SIZE`] chunks so the scanner
/// never holds more than one chunk of the file.
pub struct MarkerScanner<R: Read> {
    inner: R,
    chunk: Box<[u8; SCAN_CHUNK_SIZE]>,
    /// Offsets found in the current chunk that were not yet returned
    pending: Vec<u64>,
    /// Position of `pending` already consumed
    cursor: usize,
    /// Absolute offset of the first byte of the next chunk
    pos: u64,
    /// Whether the last byte of the previous chunk was a newline
    at_line_start: bool,
    finished: bool,
}
impl<R: Read> MarkerScanner<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            chunk: Box::new([0; SCAN_CHUNK_SIZE]),
            pending: Vec::new(),
            cursor: 0,
            pos: 0,
            at_line_start: true,
            finished: false,
        }
    }

    fn fill_pending(&mut self) -> Result<bool> {
        self.pending.clear();
        self.cursor = 0;
        while self.pending.is_empty() {
            let n = self.inner.read(&mut self.chunk[..])?;
            if n == 0 {
                return Ok(false);
            }
            let bytes = &self.chunk[..n];
            if self.at_line_start && bytes[0] == RECORD_MARKER {
                self.pending.push(self.pos);
            }
            for nl in memchr_iter(b'\n', bytes) {
                if bytes.get(nl + 1) == Some(&RECORD_MARKER) {
                    self.pending.push(self.pos + nl as u64 + 1);
                }
            }
            self.at_line_start = bytes[n - 1] == b'\n';
            self.pos += n as u64;
        }
        Ok(true)
    }
}
impl<R: Read> Iterator for MarkerScanner<R> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.cursor == self.pending.len() {
            match self.fill_pending() {
                Ok(true) => {}
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        let offset = self.pending[self.cursor];
        self.cursor += 1;
        Some(Ok(offset))
    }
}
