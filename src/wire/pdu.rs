//! The owning byte buffer behind every encode and decode.

use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::error::{Result, TlvErrorKind};
use crate::rules::EncodingRules;

/// Upper bound on the number of buffers retained for reuse.
const POOL_LIMIT: usize = 32;

static POOL: Lazy<Mutex<Vec<Vec<u8>>>> = Lazy::new(|| Mutex::new(Vec::new()));

fn take_buffer() -> Vec<u8> {
    POOL.lock()
        .ok()
        .and_then(|mut pool| pool.pop())
        .unwrap_or_default()
}

fn put_buffer(mut buffer: Vec<u8>) {
    buffer.clear();
    if let Ok(mut pool) = POOL.lock() {
        if pool.len() < POOL_LIMIT {
            pool.push(buffer);
        }
    }
}

/// A complete encoded value: the encoding rule it was produced under, the
/// owning byte buffer, and a read cursor.
///
/// The buffer is exclusively owned; on drop it returns to a process-wide
/// pool with its length reset and its capacity retained.
#[derive(Debug)]
pub struct Pdu {
    rule: EncodingRules,
    buffer: Vec<u8>,
    offset: usize,
}

impl Pdu {
    /// An empty PDU ready for encoding under `rule`.
    pub fn new(rule: EncodingRules) -> Self {
        Self {
            rule,
            buffer: take_buffer(),
            offset: 0,
        }
    }

    /// A PDU seeded from `bytes`, ready for decoding under `rule`.
    ///
    /// The data is copied: a sub-PDU never shares mutable state with its
    /// parent.
    pub fn from_bytes(rule: EncodingRules, bytes: &[u8]) -> Self {
        let mut buffer = take_buffer();
        buffer.extend_from_slice(bytes);
        Self {
            rule,
            buffer,
            offset: 0,
        }
    }

    pub fn rule(&self) -> EncodingRules {
        self.rule
    }

    /// The full encoded contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// The bytes at and beyond the cursor.
    pub fn remaining(&self) -> &[u8] {
        &self.buffer[self.offset..]
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether the cursor has consumed the whole buffer.
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    /// Moves the cursor to `offset`.
    pub(crate) fn seek(&mut self, offset: usize) {
        debug_assert!(offset <= self.buffer.len());
        self.offset = offset.min(self.buffer.len());
    }

    /// Advances the cursor by `count` bytes.
    pub(crate) fn advance(&mut self, count: usize) -> Result<()> {
        if self.offset + count > self.buffer.len() {
            return Err(TlvErrorKind::Truncated.into());
        }
        self.offset += count;
        Ok(())
    }

    /// Appends raw bytes, leaving the cursor at the end of the buffer.
    pub(crate) fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        self.offset = self.buffer.len();
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    pub(crate) fn sync_offset_to_end(&mut self) {
        self.offset = self.buffer.len();
    }

    /// Consumes the PDU, surrendering its buffer to the caller instead of
    /// the pool.
    pub fn into_bytes(mut self) -> Vec<u8> {
        core::mem::take(&mut self.buffer)
    }
}

impl Drop for Pdu {
    fn drop(&mut self) {
        put_buffer(core::mem::take(&mut self.buffer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_stays_in_bounds() {
        let mut pdu = Pdu::from_bytes(EncodingRules::Ber, &[1, 2, 3]);
        assert_eq!(3, pdu.remaining().len());
        pdu.advance(2).unwrap();
        assert_eq!(&[3], pdu.remaining());
        assert!(pdu.advance(2).is_err());
        assert_eq!(1, pdu.remaining().len());
    }

    #[test]
    fn buffers_recycle() {
        let pdu = Pdu::from_bytes(EncodingRules::Der, &[0u8; 512]);
        drop(pdu);

        // The next PDU draws a pooled buffer with its length reset.
        let pdu = Pdu::new(EncodingRules::Der);
        assert!(pdu.is_empty());
    }

    #[test]
    fn into_bytes_moves_the_buffer() {
        let mut pdu = Pdu::new(EncodingRules::Ber);
        pdu.append(&[0x05, 0x00]);
        assert_eq!(vec![0x05, 0x00], pdu.into_bytes());
    }
}
