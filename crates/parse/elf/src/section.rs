//! ELF32 section header and string table parsing.

use crate::header::{ELF32_SHDR_SIZE, Elf32Header, ElfError, le_u32};

/// Section type: inactive entry.
pub const SHT_NULL: u32 = 0;

/// Section type: program-defined contents.
pub const SHT_PROGBITS: u32 = 1;

/// Section type: string table.
pub const SHT_STRTAB: u32 = 3;

/// Section type: occupies no file space (e.g. `.bss`).
pub const SHT_NOBITS: u32 = 8;

/// Parsed ELF32 section header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32SectionHeader {
    /// Offset into the section header string table for this section's name.
    pub sh_name: u32,
    /// Section type (`SHT_PROGBITS`, `SHT_NOBITS`, etc.).
    pub sh_type: u32,
    /// Section flags.
    pub sh_flags: u32,
    /// Virtual address of the section in memory (0 for non-loaded sections).
    pub sh_addr: u32,
    /// File offset of the section data.
    pub sh_offset: u32,
    /// Size of the section data in bytes.
    pub sh_size: u32,
    /// Associated section index.
    pub sh_link: u32,
    /// Extra info (interpretation depends on section type).
    pub sh_info: u32,
    /// Required alignment of the section (0 and 1 mean unaligned).
    pub sh_addralign: u32,
    /// Size of each entry (for sections with fixed-size entries).
    pub sh_entsize: u32,
}

impl Elf32SectionHeader {
    /// Parse a section header from raw bytes at the given file offset.
    ///
    /// The caller must ensure `file_offset + ELF32_SHDR_SIZE <= data.len()`.
    pub(crate) fn parse(data: &[u8], file_offset: usize) -> Self {
        let b = &data[file_offset..];
        Self {
            sh_name: le_u32(b, 0),
            sh_type: le_u32(b, 4),
            sh_flags: le_u32(b, 8),
            sh_addr: le_u32(b, 12),
            sh_offset: le_u32(b, 16),
            sh_size: le_u32(b, 20),
            sh_link: le_u32(b, 24),
            sh_info: le_u32(b, 28),
            sh_addralign: le_u32(b, 32),
            sh_entsize: le_u32(b, 36),
        }
    }

    /// Serializes the entry in ELF32 little-endian layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; ELF32_SHDR_SIZE] {
        let fields = [
            self.sh_name,
            self.sh_type,
            self.sh_flags,
            self.sh_addr,
            self.sh_offset,
            self.sh_size,
            self.sh_link,
            self.sh_info,
            self.sh_addralign,
            self.sh_entsize,
        ];
        let mut out = [0u8; ELF32_SHDR_SIZE];
        for (chunk, field) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        out
    }

    /// Whether the section occupies bytes in the file.
    #[must_use]
    pub fn has_file_data(&self) -> bool {
        self.sh_type != SHT_NOBITS && self.sh_type != SHT_NULL
    }

    /// Effective alignment (at least 1).
    #[must_use]
    pub fn alignment(&self) -> u32 {
        self.sh_addralign.max(1)
    }
}

/// Reads every section header described by `header`.
///
/// # Errors
///
/// Returns [`ElfError::InvalidOffset`] if the table lies outside `data`.
pub fn section_headers(
    data: &[u8],
    header: &Elf32Header,
) -> Result<Vec<Elf32SectionHeader>, ElfError> {
    if header.section_header_table_end() > data.len() as u64 {
        return Err(ElfError::InvalidOffset);
    }
    let shoff = header.e_shoff as usize;
    Ok((0..usize::from(header.e_shnum))
        .map(|i| Elf32SectionHeader::parse(data, shoff + i * ELF32_SHDR_SIZE))
        .collect())
}

/// A zero-copy wrapper around a NUL-terminated string table section.
#[derive(Debug, Clone, Copy)]
pub struct StringTable<'a> {
    data: &'a [u8],
}

impl<'a> StringTable<'a> {
    /// Creates a new string table from the raw section data.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Looks up a NUL-terminated string at the given byte offset.
    ///
    /// Returns `None` if the offset is out of bounds or the string
    /// contains invalid UTF-8.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<&'a str> {
        let remaining = self.data.get(offset as usize..)?;
        let nul_pos = remaining.iter().position(|&b| b == 0)?;
        core::str::from_utf8(&remaining[..nul_pos]).ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::header::le_u16;
    use crate::header::tests::make_elf_header;

    /// Append a section header to `buf` and bump `e_shnum`.
    ///
    /// The caller is responsible for pointing `e_shoff` at the first entry.
    pub(crate) fn append_section(
        buf: &mut Vec<u8>,
        sh_name: u32,
        sh_type: u32,
        sh_offset: u32,
        sh_size: u32,
        sh_addralign: u32,
    ) {
        let header = Elf32SectionHeader {
            sh_name,
            sh_type,
            sh_flags: 0,
            sh_addr: 0,
            sh_offset,
            sh_size,
            sh_link: 0,
            sh_info: 0,
            sh_addralign,
            sh_entsize: 0,
        };
        buf.extend_from_slice(&header.to_bytes());

        let shnum = le_u16(buf, 48) + 1;
        buf[48..50].copy_from_slice(&shnum.to_le_bytes());
    }

    #[test]
    fn serialize_round_trips() {
        let header = Elf32SectionHeader {
            sh_name: 1,
            sh_type: SHT_PROGBITS,
            sh_flags: 6,
            sh_addr: 0x0804_8000,
            sh_offset: 0x1000,
            sh_size: 0x234,
            sh_link: 0,
            sh_info: 0,
            sh_addralign: 16,
            sh_entsize: 0,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[16..20], &0x1000u32.to_le_bytes());
        assert_eq!(Elf32SectionHeader::parse(&bytes, 0), header);
    }

    #[test]
    fn parse_table_from_header() {
        let mut buf = make_elf_header();
        let shoff = u32::try_from(buf.len()).unwrap();
        buf[32..36].copy_from_slice(&shoff.to_le_bytes());
        append_section(&mut buf, 0, SHT_NULL, 0, 0, 0);
        append_section(&mut buf, 1, SHT_NOBITS, 0x100, 0x40, 4);

        let header = Elf32Header::parse(&buf).unwrap();
        let sections = section_headers(&buf, &header).unwrap();
        assert_eq!(sections.len(), 2);
        assert!(!sections[0].has_file_data());
        assert!(!sections[1].has_file_data());
        assert_eq!(sections[1].sh_size, 0x40);
        assert_eq!(sections[0].alignment(), 1);
        assert_eq!(sections[1].alignment(), 4);
    }

    #[test]
    fn string_table_lookup() {
        let table = StringTable::new(b"\0.text\0.debug_line\0");
        assert_eq!(table.get(0), Some(""));
        assert_eq!(table.get(1), Some(".text"));
        assert_eq!(table.get(7), Some(".debug_line"));
        assert_eq!(table.get(14), Some("line"));
        assert_eq!(table.get(19), None);
        assert_eq!(table.get(100), None);
    }
}
