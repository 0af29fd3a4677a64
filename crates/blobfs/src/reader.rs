//! Sequential and random-access readers over remote blobs

use crate::buffer::ReadBuffer;
use crate::client::BlobService;
use crate::error::translate;
use crate::fs::{InputStream, IoContext, RandomAccessFile};
use crate::metadata::MetadataRecord;
use crate::path::StoragePath;
use crate::{BlobFsError, Result};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Cursor state, touched only by sequential reads and seeks
#[derive(Debug, Default)]
struct Cursor {
    position: u64,
    buffer: Option<ReadBuffer>,
}

/// An open blob.
///
/// The size is a snapshot: it is fetched at most once, either when the
/// handle is opened or on first need, and is never refreshed. Positional
/// reads do not take the cursor lock, so they may run concurrently with each
/// other and with sequential reads.
pub(crate) struct ObjectHandle {
    service: Arc<dyn BlobService>,
    path: StoragePath,
    io_context: IoContext,
    chunk_size: usize,
    size: OnceLock<u64>,
    closed: AtomicBool,
    cursor: Mutex<Cursor>,
}

impl ObjectHandle {
    pub(crate) fn new(
        service: Arc<dyn BlobService>,
        path: StoragePath,
        io_context: IoContext,
        chunk_size: usize,
        known_size: Option<u64>,
    ) -> Self {
        let size = OnceLock::new();
        if let Some(known) = known_size {
            let _ = size.set(known);
        }
        Self {
            service,
            path,
            io_context,
            chunk_size: chunk_size.max(1),
            size,
            closed: AtomicBool::new(false),
            cursor: Mutex::new(Cursor::default()),
        }
    }

    fn check_open(&self, operation: &str) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BlobFsError::closed(operation));
        }
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        if let Some(size) = self.size.get() {
            return Ok(*size);
        }
        let properties = self
            .service
            .head(self.path.container(), self.path.key())
            .map_err(|e| translate(e, &format!("stat {}", self.path)))?;
        Ok(*self.size.get_or_init(|| properties.size))
    }

    fn fetch(&self, range: Range<u64>) -> Result<Bytes> {
        debug!(path = %self.path, start = range.start, end = range.end, "Fetching range");
        let expected = (range.end - range.start) as usize;
        let data = self
            .service
            .get_range(self.path.container(), self.path.key(), range)
            .map_err(|e| translate(e, &format!("read {}", self.path)))?;
        if data.len() > expected {
            return Ok(data.slice(..expected));
        }
        Ok(data)
    }

    fn read(&self, nbytes: usize) -> Result<Bytes> {
        self.check_open("read")?;
        let mut cursor = self.cursor.lock();
        let size = self.size()?;

        let start = cursor.position;
        let end = start.saturating_add(nbytes as u64).min(size);
        if start >= end {
            return Ok(Bytes::new());
        }

        let mut out = BytesMut::new();
        let mut position = start;
        while position < end {
            let remaining = (end - position) as usize;

            let buffered = cursor
                .buffer
                .as_ref()
                .and_then(|buffer| buffer.slice_from(position, remaining));
            if let Some(chunk) = buffered {
                trace!(path = %self.path, position, len = chunk.len(), "Buffer hit");
                if out.is_empty() && chunk.len() == remaining {
                    cursor.position = end;
                    return Ok(chunk);
                }
                position += chunk.len() as u64;
                out.extend_from_slice(&chunk);
                continue;
            }

            if remaining >= self.chunk_size {
                let data = self.fetch(position..end)?;
                if data.is_empty() {
                    break;
                }
                position += data.len() as u64;
                if out.is_empty() && position == end {
                    cursor.position = end;
                    return Ok(data);
                }
                out.extend_from_slice(&data);
            } else {
                let chunk_end = position.saturating_add(self.chunk_size as u64).min(size);
                let data = self.fetch(position..chunk_end)?;
                if data.is_empty() {
                    break;
                }
                cursor.buffer = Some(ReadBuffer::new(data, position));
            }
        }

        cursor.position = position;
        Ok(out.freeze())
    }

    fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        let data = self.read(buf.len())?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    fn read_at(&self, position: u64, nbytes: usize) -> Result<Bytes> {
        self.check_open("read_at")?;
        let size = self.size()?;
        if position > size {
            return Err(BlobFsError::InvalidArgument(format!(
                "read position {} is beyond the end of '{}' ({} bytes)",
                position, self.path, size
            )));
        }

        let end = position.saturating_add(nbytes as u64).min(size);
        if position == end {
            return Ok(Bytes::new());
        }
        self.fetch(position..end)
    }

    fn read_at_into(&self, position: u64, buf: &mut [u8]) -> Result<usize> {
        let data = self.read_at(position, buf.len())?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    fn seek(&self, position: u64) -> Result<()> {
        self.check_open("seek")?;
        let size = self.size()?;
        if position > size {
            return Err(BlobFsError::InvalidArgument(format!(
                "cannot seek to {} beyond the end of '{}' ({} bytes)",
                position, self.path, size
            )));
        }
        self.cursor.lock().position = position;
        Ok(())
    }

    fn tell(&self) -> Result<u64> {
        self.check_open("tell")?;
        Ok(self.cursor.lock().position)
    }

    fn read_metadata(&self) -> Result<MetadataRecord> {
        self.check_open("read metadata")?;
        let properties = self
            .service
            .head(self.path.container(), self.path.key())
            .map_err(|e| translate(e, &format!("read metadata of {}", self.path)))?;
        self.size.get_or_init(|| properties.size);
        Ok(MetadataRecord::from_properties(&properties))
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.cursor.lock().buffer = None;
        debug!(path = %self.path, "Closed");
        Ok(())
    }

    fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolve a `SeekFrom` against the current cursor and size
    fn resolve_seek(&self, pos: SeekFrom) -> Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(offset) => return Ok(offset),
            SeekFrom::End(offset) => (self.size()?, offset),
            SeekFrom::Current(offset) => (self.tell()?, offset),
        };
        base.checked_add_signed(offset).ok_or_else(|| {
            BlobFsError::InvalidArgument(format!("cannot seek before the start of '{}'", self.path))
        })
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("path", &self.path)
            .field("size", &self.size.get())
            .field("closed", &self.closed())
            .finish()
    }
}

/// A sequential reader over one blob
#[derive(Debug)]
pub struct BlobInputStream {
    handle: ObjectHandle,
}

impl BlobInputStream {
    pub(crate) fn new(handle: ObjectHandle) -> Self {
        Self { handle }
    }

    /// The path this stream reads
    pub fn path(&self) -> &StoragePath {
        &self.handle.path
    }
}

impl InputStream for BlobInputStream {
    fn read(&self, nbytes: usize) -> Result<Bytes> {
        self.handle.read(nbytes)
    }

    fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        self.handle.read_into(buf)
    }

    fn tell(&self) -> Result<u64> {
        self.handle.tell()
    }

    fn read_metadata(&self) -> Result<MetadataRecord> {
        self.handle.read_metadata()
    }

    fn close(&self) -> Result<()> {
        self.handle.close()
    }

    fn closed(&self) -> bool {
        self.handle.closed()
    }

    fn io_context(&self) -> IoContext {
        self.handle.io_context
    }
}

impl Read for BlobInputStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.handle.read_into(buf)?)
    }
}

/// A random-access reader over one blob
#[derive(Debug)]
pub struct BlobRandomAccessFile {
    handle: ObjectHandle,
}

impl BlobRandomAccessFile {
    pub(crate) fn new(handle: ObjectHandle) -> Self {
        Self { handle }
    }

    /// The path this file reads
    pub fn path(&self) -> &StoragePath {
        &self.handle.path
    }
}

impl InputStream for BlobRandomAccessFile {
    fn read(&self, nbytes: usize) -> Result<Bytes> {
        self.handle.read(nbytes)
    }

    fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        self.handle.read_into(buf)
    }

    fn tell(&self) -> Result<u64> {
        self.handle.tell()
    }

    fn read_metadata(&self) -> Result<MetadataRecord> {
        self.handle.read_metadata()
    }

    fn close(&self) -> Result<()> {
        self.handle.close()
    }

    fn closed(&self) -> bool {
        self.handle.closed()
    }

    fn io_context(&self) -> IoContext {
        self.handle.io_context
    }
}

impl RandomAccessFile for BlobRandomAccessFile {
    fn read_at(&self, position: u64, nbytes: usize) -> Result<Bytes> {
        self.handle.read_at(position, nbytes)
    }

    fn read_at_into(&self, position: u64, buf: &mut [u8]) -> Result<usize> {
        self.handle.read_at_into(position, buf)
    }

    fn seek(&self, position: u64) -> Result<()> {
        self.handle.seek(position)
    }

    fn size(&self) -> Result<u64> {
        self.handle.check_open("get size")?;
        self.handle.size()
    }
}

impl Read for BlobRandomAccessFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.handle.read_into(buf)?)
    }
}

impl Seek for BlobRandomAccessFile {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let position = self.handle.resolve_seek(pos)?;
        self.handle.seek(position)?;
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryService;

    const FOX: &[u8] = b"The quick brown fox";

    fn handle_for(data: &[u8], chunk_size: usize) -> (Arc<MemoryService>, ObjectHandle) {
        let service = Arc::new(MemoryService::new());
        service.create_container("c");
        service.put_blob("c", "obj", Bytes::copy_from_slice(data)).unwrap();
        let handle = ObjectHandle::new(
            service.clone(),
            StoragePath::parse("c/obj").unwrap(),
            IoContext::default(),
            chunk_size,
            None,
        );
        (service, handle)
    }

    #[test]
    fn test_read_whole_object_then_eof() {
        let (_, handle) = handle_for(FOX, 8);
        assert_eq!(handle.read(1024).unwrap(), FOX);
        assert_eq!(handle.tell().unwrap(), FOX.len() as u64);
        assert!(handle.read(1024).unwrap().is_empty());
    }

    #[test]
    fn test_small_reads_span_chunks() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let (service, handle) = handle_for(&data, 64);

        let mut out = Vec::new();
        loop {
            let chunk = handle.read(17).unwrap();
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        assert_eq!(out, data);
        // One fetch per 64-byte chunk.
        assert_eq!(service.range_requests(), 1000_usize.div_ceil(64));
    }

    #[test]
    fn test_large_reads_bypass_buffer() {
        let data = vec![7u8; 300];
        let (service, handle) = handle_for(&data, 100);
        assert_eq!(handle.read(250).unwrap().len(), 250);
        assert_eq!(service.range_requests(), 1);
        assert_eq!(handle.read(250).unwrap().len(), 50);
    }

    #[test]
    fn test_read_at_leaves_cursor_alone() {
        let (_, handle) = handle_for(FOX, 4);
        assert_eq!(handle.read(4).unwrap(), &b"The "[..]);
        assert_eq!(handle.read_at(4, 5).unwrap(), &b"quick"[..]);
        assert_eq!(handle.tell().unwrap(), 4);
        assert_eq!(handle.read(5).unwrap(), &b"quick"[..]);
    }

    #[test]
    fn test_read_at_bounds() {
        let (_, handle) = handle_for(FOX, 4);
        assert!(handle.read_at(FOX.len() as u64, 10).unwrap().is_empty());
        assert_eq!(handle.read_at(16, 10).unwrap(), &b"fox"[..]);
        let err = handle.read_at(FOX.len() as u64 + 1, 1).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_size_is_a_snapshot() {
        let (service, handle) = handle_for(FOX, 4);
        assert_eq!(handle.size().unwrap(), FOX.len() as u64);
        service
            .put_blob("c", "obj", Bytes::from_static(b"The quick brown fox jumps"))
            .unwrap();
        assert_eq!(handle.size().unwrap(), FOX.len() as u64);
        assert_eq!(handle.read_at(16, 100).unwrap(), &b"fox"[..]);
    }

    #[test]
    fn test_seek_from() {
        let (_, handle) = handle_for(FOX, 4);
        assert_eq!(handle.resolve_seek(SeekFrom::End(-3)).unwrap(), 16);
        assert_eq!(handle.resolve_seek(SeekFrom::Current(2)).unwrap(), 2);
        assert!(handle.resolve_seek(SeekFrom::Current(-1)).is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let (_, handle) = handle_for(FOX, 4);
        handle.close().unwrap();
        handle.close().unwrap();
        assert!(handle.closed());
        assert_eq!(handle.tell().unwrap_err().kind(), crate::ErrorKind::InvalidState);
    }
}
