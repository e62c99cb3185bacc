//! Append-only destination buffer for a rewritten file.
//!
//! The source file is only ever read through a shared slice; every write of
//! the rewrite goes to an [`OutputImage`], so a region is never read and
//! written in the same operation.

/// A growable output file image.
///
/// Writes past the current end zero-fill the gap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputImage {
    bytes: Vec<u8>,
}

impl OutputImage {
    /// Creates an empty image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty image with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Writes `data` at `offset`, growing the image as needed.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) {
        let end = offset + data.len();
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        self.bytes[offset..end].copy_from_slice(data);
    }

    /// Writes a little-endian `u32` at `offset`.
    pub fn write_u32_at(&mut self, offset: usize, value: u32) {
        self.write_at(offset, &value.to_le_bytes());
    }

    /// Current length of the image.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Truncates or zero-extends the image to exactly `len` bytes.
    pub fn set_len(&mut self, len: usize) {
        self.bytes.resize(len, 0);
    }

    /// The image contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the image, returning its contents.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}
