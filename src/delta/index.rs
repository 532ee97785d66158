use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use tracing::debug;

use crate::error::{IndexError, Result};

/// Size of one index slot in bytes
pub const SLOT_SIZE: usize = 8;

/// Fixed-width secondary index mapping record ordinals to byte offsets
///
/// Slot `i` holds the offset of the i-th record as a little-endian `u64` at
/// byte `i * SLOT_SIZE` of an anonymous temporary file. The file is created
/// exclusively for this index, is never visible under a name, and is removed
/// by the operating system as soon as the index is dropped, on every exit path.
#[derive(Debug)]
pub(crate) struct PositionIndex {
    file: File,
    count: usize,
}
impl PositionIndex {
    /// Writes every offset of `positions` to a fresh index file
    pub fn build<I>(positions: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<u64>>,
    {
        let file = tempfile::tempfile()?;
        let mut count = 0;
        {
            let mut writer = BufWriter::new(&file);
            for offset in positions {
                writer.write_u64::<LittleEndian>(offset?)?;
                count += 1;
            }
            writer.flush()?;
        }
        debug!(records = count, bytes = count * SLOT_SIZE, "built position index");
        Ok(Self { file, count })
    }

    /// Number of indexed records
    pub fn count(&self) -> usize {
        self.count
    }

    /// Reads the offset stored in slot `idx`
    ///
    /// The caller is responsible for bounds checking against [`Self::count`];
    /// a slot that cannot be read in full means the index file is corrupted.
    pub fn offset(&self, idx: usize) -> Result<u64> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start((idx * SLOT_SIZE) as u64))?;

        let mut buffer = [0u8; SLOT_SIZE];
        let mut read = 0;
        while read < SLOT_SIZE {
            match file.read(&mut buffer[read..])? {
                0 => break,
                n => read += n,
            }
        }
        if read < SLOT_SIZE {
            return Err(IndexError::Corrupted { slot: idx, read }.into());
        }
        Ok(LittleEndian::read_u64(&buffer))
    }
}
