//! File transfer sub-protocol (spec §4.6): chunked send/receive with offset
//! verification.

use thiserror::Error;

use crate::descriptor::{DescriptorId, FileDescriptor};

/// Protocol-violation outcomes specific to chunk transfer (spec §4.6, §7
/// "ProtocolViolation ... out-of-order file chunk").
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTransferError {
    #[error("chunk start {actual} does not match expected offset {expected}")]
    OutOfOrder { expected: u64, actual: u64 },
}

/// `sendingFiles`/`receivingFiles` are keyed `path -> {...}` per spec (the
/// path belongs to the filesystem collaborator, outside this crate); the
/// wire protocol instead identifies a file by `DescriptorId`, so the
/// connection layer keys its tables on this string derived from it.
pub fn file_key(descriptor_id: DescriptorId) -> String {
    format!("{}:{}", descriptor_id.twincode_outbound_id, descriptor_id.sequence_id)
}

/// `sendingFiles` entry (spec §4.6 "Sender maintains sendingFiles: path ->
/// { file handle, fileInfo, currentOffset }"). The file handle itself is
/// opened lazily by the caller on first `read_chunk`; this type only tracks
/// the bookkeeping the spec assigns to the connection layer, not actual I/O,
/// which belongs to the storage/filesystem collaborator.
pub struct SendingFile {
    pub file_info: FileDescriptor,
    pub current_offset: u64,
    opened: bool,
}

impl SendingFile {
    pub fn new(file_info: FileDescriptor) -> Self {
        Self {
            file_info,
            current_offset: 0,
            opened: false,
        }
    }

    /// Verifies `chunk_start == current_offset` and advances the offset by
    /// `chunk_size` clamped to what remains (spec §4.6 "reads at most
    /// remaining = length - currentOffset bytes"). Returns the number of
    /// bytes the caller should actually read, or `None` once the file is
    /// fully sent (caller should then drop this entry).
    pub fn next_read(&mut self, chunk_start: u64, chunk_size: usize) -> Result<Option<usize>, FileTransferError> {
        self.opened = true;
        if chunk_start != self.current_offset {
            return Err(FileTransferError::OutOfOrder {
                expected: self.current_offset,
                actual: chunk_start,
            });
        }
        let remaining = (self.file_info.length as u64).saturating_sub(self.current_offset);
        if remaining == 0 {
            return Ok(None);
        }
        let to_read = (chunk_size as u64).min(remaining) as usize;
        self.current_offset += to_read as u64;
        Ok(Some(to_read))
    }

    pub fn is_complete(&self) -> bool {
        self.opened && self.current_offset >= self.file_info.length as u64
    }
}

/// `receivingFiles` entry (spec §4.6 "Receiver maintains receivingFiles:
/// path -> { file handle, expected length, currentOffset }").
pub struct ReceivingFile {
    pub expected_length: u64,
    pub current_offset: u64,
}

impl ReceivingFile {
    pub fn new(expected_length: u64) -> Self {
        Self {
            expected_length,
            current_offset: 0,
        }
    }

    /// spec §4.6 `writeChunk`: "on first call with chunk == null, create the
    /// receiver entry initialised to currentOffset=0 and return 0 ... ;
    /// otherwise require chunkStart == currentOffset (else return -1 to
    /// signal protocol violation; do not advance); write bytes, advance
    /// offset; on reaching fileDescriptor.length, close and remove."
    ///
    /// Returns the new `currentOffset`, or `Err` (the "-1" case in the
    /// source) on a chunk-start mismatch. The caller is responsible for
    /// actually writing `chunk` to disk before calling this, and for
    /// removing the table entry once `is_complete()` is true.
    pub fn accept_chunk(&mut self, chunk_start: u64, chunk: Option<&[u8]>) -> Result<u64, FileTransferError> {
        let Some(chunk) = chunk else {
            self.current_offset = 0;
            return Ok(0);
        };
        if chunk_start != self.current_offset {
            return Err(FileTransferError::OutOfOrder {
                expected: self.current_offset,
                actual: chunk_start,
            });
        }
        self.current_offset += chunk.len() as u64;
        Ok(self.current_offset)
    }

    pub fn is_complete(&self) -> bool {
        self.current_offset >= self.expected_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorHeader, DescriptorId};
    use uuid::Uuid;

    fn file_info(length: i64) -> FileDescriptor {
        let header = DescriptorHeader::new(DescriptorId::new(Uuid::new_v4(), 1), Uuid::new_v4(), 0);
        FileDescriptor::new(header, "a.bin", "bin", length)
    }

    #[test]
    fn sender_reads_bounded_by_remaining_length() {
        let mut s = SendingFile::new(file_info(100_000));
        assert_eq!(s.next_read(0, 65536).unwrap(), Some(65536));
        assert_eq!(s.next_read(65536, 65536).unwrap(), Some(34464));
        assert_eq!(s.next_read(100_000, 65536).unwrap(), None);
        assert!(s.is_complete());
    }

    #[test]
    fn sender_rejects_out_of_order_chunk_start() {
        let mut s = SendingFile::new(file_info(100_000));
        assert!(s.next_read(128, 1024).is_err());
    }

    #[test]
    fn receiver_first_null_chunk_resets_to_zero() {
        let mut r = ReceivingFile::new(100_000);
        r.current_offset = 50;
        assert_eq!(r.accept_chunk(0, None).unwrap(), 0);
        assert_eq!(r.current_offset, 0);
    }

    #[test]
    fn receiver_matches_spec_chunking_scenario() {
        let mut r = ReceivingFile::new(100_000);
        let first = vec![0u8; 65536];
        assert_eq!(r.accept_chunk(0, Some(&first)).unwrap(), 65536);
        let second = vec![0u8; 34464];
        assert_eq!(r.accept_chunk(65536, Some(&second)).unwrap(), 100_000);
        assert!(r.is_complete());
    }

    #[test]
    fn receiver_rejects_mismatched_chunk_start_without_advancing() {
        let mut r = ReceivingFile::new(100_000);
        assert!(r.accept_chunk(10, Some(&[1, 2, 3])).is_err());
        assert_eq!(r.current_offset, 0);
    }
}
