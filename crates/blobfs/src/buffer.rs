//! Read-ahead chunk kept by sequential readers

use bytes::Bytes;
use std::ops::Range;

/// The most recently fetched chunk of an object
#[derive(Debug)]
pub(crate) struct ReadBuffer {
    data: Bytes,
    /// Object offsets covered by `data`
    range: Range<u64>,
}

impl ReadBuffer {
    /// Wrap `data`, fetched from object offset `start`
    pub fn new(data: Bytes, start: u64) -> Self {
        let end = start + data.len() as u64;
        Self {
            data,
            range: start..end,
        }
    }

    pub fn contains(&self, pos: u64) -> bool {
        self.range.contains(&pos)
    }

    /// Up to `len` buffered bytes starting at `pos`, sharing the buffer's allocation
    pub fn slice_from(&self, pos: u64, len: usize) -> Option<Bytes> {
        if !self.contains(pos) {
            return None;
        }

        let offset = (pos - self.range.start) as usize;
        let end = offset + len.min(self.data.len() - offset);
        Some(self.data.slice(offset..end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_from() {
        let buffer = ReadBuffer::new(Bytes::from_static(b"0123456789"), 100);
        assert!(buffer.contains(100));
        assert!(buffer.contains(109));
        assert!(!buffer.contains(110));
        assert!(!buffer.contains(99));

        assert_eq!(buffer.slice_from(102, 3).unwrap(), Bytes::from_static(b"234"));
        assert_eq!(buffer.slice_from(107, 10).unwrap(), Bytes::from_static(b"789"));
        assert!(buffer.slice_from(50, 1).is_none());
    }

    #[test]
    fn test_empty_buffer_contains_nothing() {
        let buffer = ReadBuffer::new(Bytes::new(), 0);
        assert!(!buffer.contains(0));
        assert!(buffer.slice_from(0, 1).is_none());
    }
}
