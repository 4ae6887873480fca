use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use ferry_protocol::CHUNK_SIZE;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;

// ---------------------------------------------------------------------------
// ChunkPlan
// ---------------------------------------------------------------------------

/// Byte range of one part: `[start, start + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub part_number: u32,
    pub start: u64,
    pub length: u64,
}

impl PartRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// Splits a file into fixed-size, 1-indexed parts.
///
/// Every part is `chunk_size` bytes except the last, which holds the
/// remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: u64,
    total_parts: u32,
}

impl ChunkPlan {
    /// Plans `file_size` bytes in parts of `chunk_size` bytes.
    ///
    /// If `chunk_size` is 0, [`CHUNK_SIZE`] (5 MiB) is used.
    pub fn new(file_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if file_size == 0 {
            return Err(TransferError::EmptyFile);
        }
        let chunk_size = if chunk_size == 0 {
            CHUNK_SIZE
        } else {
            chunk_size
        };
        let parts = file_size.div_ceil(chunk_size);
        let total_parts = u32::try_from(parts).unwrap_or(u32::MAX);
        Ok(Self {
            file_size,
            chunk_size,
            total_parts,
        })
    }

    /// Plans `file_size` bytes with the protocol's fixed chunk size.
    pub fn for_file(file_size: u64) -> Result<Self, TransferError> {
        Self::new(file_size, CHUNK_SIZE)
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }

    /// Returns the byte range of the 1-indexed `part_number`.
    pub fn part_range(&self, part_number: u32) -> Result<PartRange, TransferError> {
        if part_number == 0 || part_number > self.total_parts {
            return Err(TransferError::PartOutOfRange {
                part_number,
                total_parts: self.total_parts,
            });
        }
        let start = u64::from(part_number - 1) * self.chunk_size;
        let length = if part_number == self.total_parts {
            self.file_size - start
        } else {
            self.chunk_size
        };
        Ok(PartRange {
            part_number,
            start,
            length,
        })
    }

    /// Iterates over every part in ascending order.
    pub fn parts(&self) -> impl Iterator<Item = PartRange> + '_ {
        (1..=self.total_parts).filter_map(|n| self.part_range(n).ok())
    }

    /// Sums the lengths of the given part numbers, ignoring unknown parts.
    pub fn bytes_covered(&self, part_numbers: impl IntoIterator<Item = u32>) -> u64 {
        part_numbers
            .into_iter()
            .filter_map(|n| self.part_range(n).ok())
            .map(|r| r.length)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// PartReader
// ---------------------------------------------------------------------------

/// Reads exact part ranges from a source file.
///
/// Only one part buffer is held at a time.
pub struct PartReader {
    file: tokio::fs::File,
    path: PathBuf,
    file_size: u64,
}

impl PartReader {
    /// Opens `path` for part reads.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        let file_size = file.metadata().await?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            file_size,
        })
    }

    /// Reads exactly `range.length` bytes starting at `range.start`.
    ///
    /// Fails with [`TransferError::SourceChanged`] if the file no longer has
    /// the size it had when opened.
    pub async fn read_part(&mut self, range: &PartRange) -> Result<Bytes, TransferError> {
        let actual = self.file.metadata().await?.len();
        if actual != self.file_size {
            return Err(TransferError::SourceChanged {
                expected: self.file_size,
                actual,
            });
        }

        let length = usize::try_from(range.length).map_err(|_| {
            TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "part length exceeds address space",
            ))
        })?;

        self.file.seek(SeekFrom::Start(range.start)).await?;
        let mut buf = vec![0u8; length];
        self.file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Size of the source when it was opened.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
