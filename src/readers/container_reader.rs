use crate::codec::decode_values;
use crate::error::{ProcessingError, Result};
use crate::models::{ChunkHeader, FileHeader, RecordHeader};
use crate::utils::constants::{FILE_HEADER_BYTES, RECORD_HEADER_BYTES};
use memmap2::Mmap;
use rayon::prelude::*;
use std::collections::{HashSet, VecDeque};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Entry count above which a page is decoded on the rayon pool.
const PARALLEL_DECODE_THRESHOLD: usize = 64;

enum ContainerBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl AsRef<[u8]> for ContainerBytes {
    fn as_ref(&self) -> &[u8] {
        match self {
            ContainerBytes::Mapped(mmap) => &mmap[..],
            ContainerBytes::Owned(bytes) => &bytes[..],
        }
    }
}

/// Opens containers from disk.
pub struct ContainerReader {
    use_mmap: bool,
}

impl Default for ContainerReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerReader {
    pub fn new() -> Self {
        Self { use_mmap: false }
    }

    pub fn with_mmap(use_mmap: bool) -> Self {
        Self { use_mmap }
    }

    pub fn open(&self, path: &Path) -> Result<Container> {
        let bytes = if self.use_mmap {
            let file = File::open(path)?;
            // The mapping is only ever read
            let mmap = unsafe { Mmap::map(&file)? };
            ContainerBytes::Mapped(mmap)
        } else {
            ContainerBytes::Owned(std::fs::read(path)?)
        };

        let mut container = Container::from_source(bytes)?;
        container.path = Some(path.to_path_buf());
        debug!(
            "Opened {} ({} chunks, {} records declared)",
            path.display(),
            container.header.chunk_count,
            container.header.record_count
        );
        Ok(container)
    }
}

/// Counters accumulated while walking the chunk chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub chunks: usize,
    pub live_records: usize,
    pub deleted_records: usize,
}

/// A verified view over one container's bytes.
///
/// Walking is sequential: every chunk's entries are decoded and checked
/// against the chunk checksum before any of its records is handed out.
pub struct Container {
    path: Option<PathBuf>,
    bytes: ContainerBytes,
    header: FileHeader,
    next_chunk_offset: Option<u64>,
    visited: HashSet<u64>,
    pending: VecDeque<RecordHeader>,
    stats: ScanStats,
}

impl Container {
    /// Parse the file header of an in-memory container.
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        Self::from_source(ContainerBytes::Owned(bytes))
    }

    fn from_source(bytes: ContainerBytes) -> Result<Self> {
        let header = FileHeader::from_bytes(bytes.as_ref())?;
        Ok(Self {
            path: None,
            bytes,
            header,
            next_chunk_offset: Some(FILE_HEADER_BYTES as u64),
            visited: HashSet::new(),
            pending: VecDeque::new(),
            stats: ScanStats::default(),
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Restart the walk at the first chunk.
    pub fn rewind(&mut self) {
        self.next_chunk_offset = Some(FILE_HEADER_BYTES as u64);
        self.visited.clear();
        self.pending.clear();
        self.stats = ScanStats::default();
    }

    /// Read and verify the next chunk; its live records become available
    /// through [`Container::next_record`].
    pub fn next_chunk(&mut self) -> Result<Option<ChunkHeader>> {
        let offset = match self.next_chunk_offset {
            Some(offset) => offset,
            None => return Ok(None),
        };

        // An empty container ends right after its header
        if offset == FILE_HEADER_BYTES as u64 && self.len() == FILE_HEADER_BYTES {
            self.next_chunk_offset = None;
            return Ok(None);
        }

        if !self.visited.insert(offset) {
            return Err(ProcessingError::CorruptChunkStructure {
                offset,
                message: "chunk chain loops back on itself".to_string(),
            });
        }

        let data = self.bytes.as_ref();
        let start = offset as usize;
        let page = data.get(start..).unwrap_or(&[]);
        let chunk = ChunkHeader::from_bytes(page, offset)?;

        let entries_len = chunk.nrecs as usize * RECORD_HEADER_BYTES;
        let entries_end = ChunkHeader::SIZE + entries_len;
        if page.len() < entries_end {
            return Err(ProcessingError::TruncatedRecord {
                offset: offset + ChunkHeader::SIZE as u64,
                needed: entries_len,
                available: page.len().saturating_sub(ChunkHeader::SIZE),
            });
        }

        let entries = &page[ChunkHeader::SIZE..entries_end];
        let records = decode_entries(entries, offset + ChunkHeader::SIZE as u64)?;

        let live_checksums = records
            .iter()
            .filter(|r| !r.is_deleted())
            .fold(0u32, |acc, r| acc ^ r.checksum);
        let computed = chunk.expected_checksum(live_checksums);
        if computed != chunk.checksum {
            return Err(ProcessingError::CorruptChunk {
                offset,
                stored: chunk.checksum,
                computed,
            });
        }

        let (live, deleted): (Vec<_>, Vec<_>) = records.into_iter().partition(|r| !r.is_deleted());
        debug!(
            "Chunk at byte {}: {} live, {} deleted entries",
            offset,
            live.len(),
            deleted.len()
        );

        self.stats.chunks += 1;
        self.stats.live_records += live.len();
        self.stats.deleted_records += deleted.len();
        self.pending.extend(live);
        self.next_chunk_offset = chunk.next_offset();

        Ok(Some(chunk))
    }

    /// Next live record, crossing chunk boundaries as needed.
    pub fn next_record(&mut self) -> Result<Option<RecordHeader>> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Ok(Some(record));
            }
            if self.next_chunk()?.is_none() {
                return Ok(None);
            }
        }
    }

    /// Walk the whole chain from the start and collect every live record.
    pub fn records(&mut self) -> Result<Vec<RecordHeader>> {
        self.rewind();
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Iterate over live records from the current position.
    pub fn iter_records(&mut self) -> RecordIter<'_> {
        RecordIter {
            container: self,
            failed: false,
        }
    }

    /// Raw payload bytes of a record, bounded by its size and the file.
    pub fn payload(&self, record: &RecordHeader) -> Result<&[u8]> {
        let start = record
            .data_offset()
            .filter(|offset| *offset >= FILE_HEADER_BYTES as u64)
            .ok_or_else(|| ProcessingError::CorruptRecord {
                offset: record.offset,
                message: format!("invalid data address {}", record.data_address),
            })?;
        let end = start + record.payload_bytes();

        self.bytes
            .as_ref()
            .get(start as usize..end as usize)
            .ok_or_else(|| ProcessingError::CorruptRecord {
                offset: record.offset,
                message: format!(
                    "payload bytes {}..{} lie beyond the end of the file ({} bytes)",
                    start,
                    end,
                    self.len()
                ),
            })
    }

    /// Decode a record's payload into `ni * nj * nk` values.
    pub fn read_values(&self, record: &RecordHeader) -> Result<Vec<f64>> {
        let payload = self.payload(record)?;
        decode_values(payload, record.datyp, record.nbits, record.point_count()).map_err(
            |err| match err {
                ProcessingError::TruncatedRecord { needed, available, .. } => {
                    ProcessingError::CorruptRecord {
                        offset: record.offset,
                        message: format!(
                            "payload of {} bytes is smaller than the {} bytes its shape needs",
                            available, needed
                        ),
                    }
                }
                other => other,
            },
        )
    }
}

fn decode_entries(entries: &[u8], base_offset: u64) -> Result<Vec<RecordHeader>> {
    let count = entries.len() / RECORD_HEADER_BYTES;
    let decode = |i: usize| {
        let start = i * RECORD_HEADER_BYTES;
        RecordHeader::from_bytes(
            &entries[start..start + RECORD_HEADER_BYTES],
            base_offset + start as u64,
        )
    };

    if count >= PARALLEL_DECODE_THRESHOLD {
        (0..count).into_par_iter().map(decode).collect()
    } else {
        (0..count).map(decode).collect()
    }
}

/// Iterator adapter over [`Container::next_record`]; stops after the first error.
pub struct RecordIter<'a> {
    container: &'a mut Container,
    failed: bool,
}

impl Iterator for RecordIter<'_> {
    type Item = Result<RecordHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.container.next_record() {
            Ok(record) => record.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Open a container from disk with buffered reads.
pub fn open_container(path: &Path) -> Result<Container> {
    ContainerReader::new().open(path)
}
