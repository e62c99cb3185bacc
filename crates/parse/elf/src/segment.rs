//! ELF32 program headers.
//!
//! Program headers are never relocated; they only bound the region of the
//! file whose layout must survive a rewrite unchanged.

use crate::header::{ELF32_PHDR_SIZE, Elf32Header, ElfError, le_u32};

/// Program header type: loadable segment.
pub const PT_LOAD: u32 = 1;

/// Parsed ELF32 program header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32ProgramHeader {
    /// Segment type.
    pub p_type: u32,
    /// Offset of the segment data in the file.
    pub p_offset: u32,
    /// Virtual address of the segment.
    pub p_vaddr: u32,
    /// Physical address of the segment.
    pub p_paddr: u32,
    /// Size of the segment data in the file.
    pub p_filesz: u32,
    /// Size of the segment in memory.
    pub p_memsz: u32,
    /// Segment permission flags.
    pub p_flags: u32,
    /// Segment alignment.
    pub p_align: u32,
}

impl Elf32ProgramHeader {
    /// Parse a program header entry from raw bytes at the given file offset.
    ///
    /// The caller must ensure `file_offset + ELF32_PHDR_SIZE <= data.len()`.
    pub(crate) fn parse(data: &[u8], file_offset: usize) -> Self {
        let b = &data[file_offset..];
        Self {
            p_type: le_u32(b, 0),
            p_offset: le_u32(b, 4),
            p_vaddr: le_u32(b, 8),
            p_paddr: le_u32(b, 12),
            p_filesz: le_u32(b, 16),
            p_memsz: le_u32(b, 20),
            p_flags: le_u32(b, 24),
            p_align: le_u32(b, 28),
        }
    }

    /// Whether this is a `PT_LOAD` segment.
    #[must_use]
    pub fn is_load(&self) -> bool {
        self.p_type == PT_LOAD
    }

    /// End of the file range covered by the segment.
    #[must_use]
    pub fn file_end(&self) -> u64 {
        u64::from(self.p_offset) + u64::from(self.p_filesz)
    }
}

/// Reads every program header described by `header`.
///
/// # Errors
///
/// Returns [`ElfError::InvalidOffset`] if the table lies outside `data`.
pub fn program_headers(
    data: &[u8],
    header: &Elf32Header,
) -> Result<Vec<Elf32ProgramHeader>, ElfError> {
    if header.program_header_table_end() > data.len() as u64 {
        return Err(ElfError::InvalidOffset);
    }
    let phoff = header.e_phoff as usize;
    Ok((0..usize::from(header.e_phnum))
        .map(|i| Elf32ProgramHeader::parse(data, phoff + i * ELF32_PHDR_SIZE))
        .collect())
}

/// The end of the fixed region: the highest file byte covered by any
/// program header that occupies file bytes, or 0 if there is none.
#[must_use]
pub fn fixed_region_end(phdrs: &[Elf32ProgramHeader]) -> u64 {
    phdrs
        .iter()
        .filter(|p| p.p_filesz > 0)
        .map(Elf32ProgramHeader::file_end)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::tests::{append_phdr, make_elf_header};

    const PT_NOTE: u32 = 4;

    #[test]
    fn no_program_headers() {
        let buf = make_elf_header();
        let header = Elf32Header::parse(&buf).unwrap();
        let phdrs = program_headers(&buf, &header).unwrap();
        assert!(phdrs.is_empty());
        assert_eq!(fixed_region_end(&phdrs), 0);
    }

    #[test]
    fn parse_entries() {
        let mut buf = make_elf_header();
        append_phdr(&mut buf, PT_LOAD, 0, 0x0804_8000, 0x200, 0x300);
        append_phdr(&mut buf, PT_NOTE, 0x100, 0, 0x20, 0x20);
        let header = Elf32Header::parse(&buf).unwrap();
        let phdrs = program_headers(&buf, &header).unwrap();

        assert_eq!(phdrs.len(), 2);
        assert!(phdrs[0].is_load());
        assert!(!phdrs[1].is_load());
        assert_eq!(phdrs[0].p_vaddr, 0x0804_8000);
        assert_eq!(phdrs[0].p_filesz, 0x200);
        assert_eq!(phdrs[0].p_memsz, 0x300);
        assert_eq!(phdrs[0].p_flags, 5);
        assert_eq!(phdrs[1].file_end(), 0x120);
    }

    #[test]
    fn fixed_end_is_highest_file_byte() {
        let mut buf = make_elf_header();
        append_phdr(&mut buf, PT_LOAD, 0, 0x0804_8000, 0x200, 0x200);
        append_phdr(&mut buf, PT_LOAD, 0x200, 0x0804_9200, 0x80, 0x1000);
        // A bss-only segment occupies no file bytes.
        append_phdr(&mut buf, PT_LOAD, 0x5000, 0x0805_0000, 0, 0x1000);
        let header = Elf32Header::parse(&buf).unwrap();
        let phdrs = program_headers(&buf, &header).unwrap();
        assert_eq!(fixed_region_end(&phdrs), 0x280);
    }
}
