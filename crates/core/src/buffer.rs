use crate::error::{Result, TransportError};

/// Owned, resizable byte region carrying one RTP or RTCP packet.
///
/// The length is always the number of valid bytes. The buffer only grows or
/// shrinks through explicit calls ([`append`](Self::append),
/// [`resize`](Self::resize), [`set_data`](Self::set_data)); field writes such
/// as [`write_be32`](Self::write_be32) never extend it.
///
/// `Clone` is a deep copy, so a cloned buffer can be mutated freely without
/// touching the original.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Append bytes after the current end.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Replace the whole content.
    pub fn set_data(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
    }

    /// Set the length explicitly. Growth is zero-filled.
    pub fn resize(&mut self, len: usize) {
        self.data.resize(len, 0);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Overwrite the 32-bit big-endian field starting at `offset`.
    ///
    /// Fails with [`TransportError::OutOfBounds`] when the field would extend
    /// past the valid length.
    pub fn write_be32(&mut self, offset: usize, value: u32) -> Result<()> {
        let len = self.data.len();
        let field = offset
            .checked_add(4)
            .and_then(|end| self.data.get_mut(offset..end))
            .ok_or(TransportError::OutOfBounds { offset, len })?;
        field.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Read the 32-bit big-endian field starting at `offset`.
    pub fn read_be32(&self, offset: usize) -> Option<u32> {
        let field = self.data.get(offset..offset.checked_add(4)?)?;
        Some(u32::from_be_bytes([field[0], field[1], field[2], field[3]]))
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Self::from_slice(bytes)
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
