//! ELF32 header parsing.
//!
//! Parses the ELF32 file header from a raw byte slice using safe field
//! extraction via `from_le_bytes()`.

use thiserror::Error;

/// ELF magic bytes: `\x7fELF`.
pub(crate) const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// ELF class: 32-bit.
pub(crate) const ELFCLASS32: u8 = 1;

/// ELF data encoding: little-endian.
pub(crate) const ELFDATA2LSB: u8 = 1;

/// Size of an ELF32 file header (52 bytes).
pub const ELF32_EHDR_SIZE: usize = 52;

/// Size of an ELF32 program header entry (32 bytes).
pub const ELF32_PHDR_SIZE: usize = 32;

/// Size of an ELF32 section header entry (40 bytes).
pub const ELF32_SHDR_SIZE: usize = 40;

/// Byte offset of `e_shoff` within the file header.
pub(crate) const E_SHOFF_OFFSET: usize = 32;

/// Read a little-endian `u16` from `data` at byte offset `off`.
///
/// # Panics
///
/// Panics if `off + 2 > data.len()`. Callers must bounds-check first.
pub(crate) fn le_u16(data: &[u8], off: usize) -> u16 {
    let mut b = [0u8; 2];
    b.copy_from_slice(&data[off..off + 2]);
    u16::from_le_bytes(b)
}

/// Read a little-endian `u32` from `data` at byte offset `off`.
pub(crate) fn le_u32(data: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[off..off + 4]);
    u32::from_le_bytes(b)
}

/// Errors that can occur when parsing or rewriting an ELF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ElfError {
    /// The file does not start with the ELF magic bytes.
    #[error("invalid ELF magic bytes")]
    BadMagic,
    /// The ELF file is not 32-bit (`ELFCLASS32`).
    #[error("unsupported ELF class (expected ELFCLASS32)")]
    UnsupportedClass,
    /// The ELF file is not little-endian.
    #[error("unsupported data encoding (expected little-endian)")]
    UnsupportedEncoding,
    /// The input data is too short for the declared structure.
    #[error("input data truncated")]
    Truncated,
    /// A header offset or size is out of bounds.
    #[error("invalid header offset or size")]
    InvalidOffset,
    /// A structure size recorded in the header disagrees with ELF32.
    #[error("malformed ELF container: {what} is {found} bytes, expected {expected}")]
    MalformedContainer {
        /// The structure whose size is wrong.
        what: &'static str,
        /// Size recorded in the file header.
        found: u16,
        /// Size required by ELF32.
        expected: u16,
    },
    /// A section's file range lies outside the input.
    #[error("section {index} lies outside the file")]
    SectionOutOfBounds {
        /// Section header index.
        index: usize,
    },
    /// A section index is not present in the section header table.
    #[error("no section with index {index}")]
    NoSuchSection {
        /// Section header index.
        index: usize,
    },
}

/// Parsed ELF32 file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32Header {
    /// ELF type (`ET_EXEC`, `ET_DYN`, ...).
    pub e_type: u16,
    /// Target machine architecture.
    pub e_machine: u16,
    /// Virtual address of the entry point.
    pub e_entry: u32,
    /// Offset of the program header table in the file.
    pub e_phoff: u32,
    /// Offset of the section header table in the file.
    pub e_shoff: u32,
    /// Size of the file header.
    pub e_ehsize: u16,
    /// Size of each program header entry.
    pub e_phentsize: u16,
    /// Number of program header entries.
    pub e_phnum: u16,
    /// Size of each section header entry.
    pub e_shentsize: u16,
    /// Number of section header entries.
    pub e_shnum: u16,
    /// Section header string table index.
    pub e_shstrndx: u16,
}

impl Elf32Header {
    /// Parse an ELF32 file header from raw bytes.
    ///
    /// Validates the magic, class and encoding, checks that the recorded
    /// structure sizes are the ELF32 ones, and that both header tables fit
    /// within `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError`] if validation fails or the data is too short.
    #[expect(clippy::similar_names, reason = "ELF field names")]
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        if data.len() < ELF32_EHDR_SIZE {
            return Err(ElfError::Truncated);
        }
        if data[..4] != ELF_MAGIC {
            return Err(ElfError::BadMagic);
        }
        if data[4] != ELFCLASS32 {
            return Err(ElfError::UnsupportedClass);
        }
        if data[5] != ELFDATA2LSB {
            return Err(ElfError::UnsupportedEncoding);
        }

        let header = Self {
            e_type: le_u16(data, 16),
            e_machine: le_u16(data, 18),
            e_entry: le_u32(data, 24),
            e_phoff: le_u32(data, 28),
            e_shoff: le_u32(data, E_SHOFF_OFFSET),
            e_ehsize: le_u16(data, 40),
            e_phentsize: le_u16(data, 42),
            e_phnum: le_u16(data, 44),
            e_shentsize: le_u16(data, 46),
            e_shnum: le_u16(data, 48),
            e_shstrndx: le_u16(data, 50),
        };

        check_size("ELF header", header.e_ehsize, ELF32_EHDR_SIZE)?;
        if header.e_phnum > 0 {
            check_size("program header", header.e_phentsize, ELF32_PHDR_SIZE)?;
        }
        if header.e_shnum > 0 {
            check_size("section header", header.e_shentsize, ELF32_SHDR_SIZE)?;
        }

        if header.program_header_table_end() > data.len() as u64
            || header.section_header_table_end() > data.len() as u64
        {
            return Err(ElfError::InvalidOffset);
        }
        Ok(header)
    }

    /// End offset of the program header table.
    #[must_use]
    pub fn program_header_table_end(&self) -> u64 {
        u64::from(self.e_phoff) + u64::from(self.e_phnum) * ELF32_PHDR_SIZE as u64
    }

    /// End offset of the section header table.
    #[must_use]
    pub fn section_header_table_end(&self) -> u64 {
        u64::from(self.e_shoff) + u64::from(self.e_shnum) * ELF32_SHDR_SIZE as u64
    }
}

fn check_size(what: &'static str, found: u16, expected: usize) -> Result<(), ElfError> {
    if usize::from(found) == expected {
        return Ok(());
    }
    #[expect(clippy::cast_possible_truncation, reason = "ELF32 structure sizes fit in u16")]
    let expected = expected as u16;
    Err(ElfError::MalformedContainer {
        what,
        found,
        expected,
    })
}
