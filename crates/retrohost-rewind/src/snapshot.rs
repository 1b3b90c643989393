use std::fmt;

/// A serialized core state, stored as 32-bit words.
///
/// The byte length handed to the core is kept separately; the last word is
/// zero-padded when the length is not a multiple of four.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    words: Vec<u32>,
    len: usize,
}

impl Snapshot {
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(4)],
            len,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut snapshot = Self::zeroed(bytes.len());
        snapshot.as_bytes_mut().copy_from_slice(bytes);
        snapshot
    }

    /// Length in bytes, as reported by the core.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.words)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut(&mut self.words)[..self.len]
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot({} bytes)", self.len)
    }
}
