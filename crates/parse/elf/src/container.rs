//! ELF32 container model and section relocation engine.
//!
//! [`ElfContainer`] holds the parsed tables of an input file plus a mutable
//! descriptor per section. The copy operations write into an
//! [`OutputImage`] and thread a destination offset through the rewrite:
//! every call takes the offset the previous one returned.
//!
//! Sections lying below the end of the program-header-covered region keep
//! their original offsets; everything else may move.

use std::ops::Range;

use tracing::debug;

use crate::header::{
    E_SHOFF_OFFSET, ELF32_EHDR_SIZE, ELF32_PHDR_SIZE, ELF32_SHDR_SIZE, Elf32Header, ElfError,
};
use crate::image::OutputImage;
use crate::section::{Elf32SectionHeader, StringTable, section_headers};
use crate::segment::{Elf32ProgramHeader, fixed_region_end, program_headers};

/// Alignment of the section header table in the output.
const SHDR_TABLE_ALIGN: u32 = 4;

/// A section descriptor.
#[derive(Debug, Clone)]
pub struct Section {
    /// Section header as it will be written to the output.
    pub header: Elf32SectionHeader,
    /// Section name from the section header string table.
    pub name: String,
    /// Byte range of the section's contents in the input.
    source: Range<usize>,
    copied: bool,
}

impl Section {
    /// Whether the section has been placed in the output.
    #[must_use]
    pub fn is_copied(&self) -> bool {
        self.copied
    }
}

/// A summary of one section, as returned by [`ElfContainer::find_sections`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionInfo {
    /// Section header index.
    pub index: usize,
    /// Current file offset.
    pub offset: u32,
    /// Current size.
    pub size: u32,
    /// Effective alignment (at least 1).
    pub alignment: u32,
    /// Section type.
    pub sh_type: u32,
}

/// A parsed ELF32 file being rewritten.
#[derive(Debug, Clone)]
pub struct ElfContainer<'a> {
    data: &'a [u8],
    header: Elf32Header,
    program_headers: Vec<Elf32ProgramHeader>,
    sections: Vec<Section>,
    fixed_end: u32,
}

impl<'a> ElfContainer<'a> {
    /// Parses the file header, program headers, section headers and the
    /// section name string table.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError`] if the file is not a little-endian ELF32 file,
    /// its structure sizes disagree with ELF32, or a table or section lies
    /// outside `data`.
    pub fn open(data: &'a [u8]) -> Result<Self, ElfError> {
        let header = Elf32Header::parse(data)?;
        let program_headers = program_headers(data, &header)?;
        let headers = section_headers(data, &header)?;

        let mut sources = Vec::with_capacity(headers.len());
        for (index, shdr) in headers.iter().enumerate() {
            let start = shdr.sh_offset as usize;
            let source = if shdr.has_file_data() {
                let end = start
                    .checked_add(shdr.sh_size as usize)
                    .filter(|&end| end <= data.len())
                    .ok_or(ElfError::SectionOutOfBounds { index })?;
                start..end
            } else {
                let start = start.min(data.len());
                start..start
            };
            sources.push(source);
        }

        let names = sources
            .get(usize::from(header.e_shstrndx))
            .map(|range| StringTable::new(&data[range.clone()]));
        let sections = headers
            .into_iter()
            .zip(sources)
            .map(|(shdr, source)| Section {
                name: names
                    .and_then(|table| table.get(shdr.sh_name))
                    .unwrap_or_default()
                    .to_owned(),
                header: shdr,
                source,
                copied: false,
            })
            .collect();

        let fixed_end = fixed_region_end(&program_headers)
            .max(header.program_header_table_end())
            .max(ELF32_EHDR_SIZE as u64);
        if fixed_end > data.len() as u64 {
            return Err(ElfError::InvalidOffset);
        }
        let fixed_end = u32::try_from(fixed_end).map_err(|_| ElfError::InvalidOffset)?;

        Ok(Self {
            data,
            header,
            program_headers,
            sections,
            fixed_end,
        })
    }

    /// Returns the program headers.
    #[must_use]
    pub fn program_headers(&self) -> &[Elf32ProgramHeader] {
        &self.program_headers
    }

    /// Returns all section descriptors in table order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Returns one section descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::NoSuchSection`] if `index` is out of range.
    pub fn section(&self, index: usize) -> Result<&Section, ElfError> {
        self.sections
            .get(index)
            .ok_or(ElfError::NoSuchSection { index })
    }

    /// Returns the input contents of a section.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::NoSuchSection`] if `index` is out of range.
    pub fn section_data(&self, index: usize) -> Result<&'a [u8], ElfError> {
        let section = self.section(index)?;
        Ok(&self.data[section.source.clone()])
    }

    /// End of the region whose layout is preserved: the highest byte covered
    /// by any program header, and never less than the end of the file header
    /// and program header table.
    #[must_use]
    pub fn fixed_region_end(&self) -> u32 {
        self.fixed_end
    }

    /// Looks up sections by name in a single pass over the section table.
    ///
    /// The result has one entry per name, `None` where no section matches.
    #[must_use]
    pub fn find_sections(&self, names: &[&str]) -> Vec<Option<SectionInfo>> {
        let mut found = vec![None; names.len()];
        for (index, section) in self.sections.iter().enumerate() {
            for (slot, name) in found.iter_mut().zip(names) {
                if slot.is_none() && section.name == *name {
                    *slot = Some(SectionInfo {
                        index,
                        offset: section.header.sh_offset,
                        size: section.header.sh_size,
                        alignment: section.header.alignment(),
                        sh_type: section.header.sh_type,
                    });
                }
            }
        }
        found
    }

    /// Copies one section to the first offset at or after `dest` that
    /// satisfies its alignment, and returns the aligned end of the copy.
    ///
    /// Sections already copied and sections without file contents are left
    /// alone and `dest` is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::NoSuchSection`] for a bad index, or
    /// [`ElfError::InvalidOffset`] if the offset overflows.
    pub fn copy_section(
        &mut self,
        out: &mut OutputImage,
        dest: u32,
        index: usize,
    ) -> Result<u32, ElfError> {
        let data = self.data;
        let section = self
            .sections
            .get_mut(index)
            .ok_or(ElfError::NoSuchSection { index })?;
        if section.copied || !section.header.has_file_data() {
            return Ok(dest);
        }

        let align = section.header.alignment();
        let start = align_up(dest, align)?;
        let bytes = &data[section.source.clone()];
        out.write_at(start as usize, bytes);
        section.header.sh_offset = start;
        section.copied = true;

        let end = u32::try_from(bytes.len())
            .ok()
            .and_then(|len| start.checked_add(len))
            .ok_or(ElfError::InvalidOffset)?;
        debug!(index, name = %section.name, start, end, "copied section");
        align_up(end, align)
    }

    /// Copies the fixed region verbatim, then every section that starts
    /// inside it at its original offset.
    ///
    /// Returns the first offset past all of them, where relocatable
    /// sections may begin.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] if an offset overflows.
    pub fn copy_fixed_sections(&mut self, out: &mut OutputImage) -> Result<u32, ElfError> {
        let data = self.data;
        let fixed_end = self.fixed_end;
        out.write_at(0, &data[..fixed_end as usize]);

        let mut end = fixed_end;
        for section in &mut self.sections {
            if section.copied
                || !section.header.has_file_data()
                || section.header.sh_offset >= fixed_end
            {
                continue;
            }
            let bytes = &data[section.source.clone()];
            out.write_at(section.source.start, bytes);
            section.copied = true;
            let section_end =
                u32::try_from(section.source.end).map_err(|_| ElfError::InvalidOffset)?;
            end = end.max(section_end);
        }
        debug!(fixed_end, end, "copied fixed region");
        Ok(end)
    }

    /// Copies every section not yet copied, in table order, starting at
    /// `start`. Returns the end offset.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] if an offset overflows.
    pub fn copy_sections(&mut self, out: &mut OutputImage, start: u32) -> Result<u32, ElfError> {
        let mut offset = start;
        for index in 0..self.sections.len() {
            offset = self.copy_section(out, offset, index)?;
        }
        Ok(offset)
    }

    /// Sets the size recorded for a section whose contents were generated.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::NoSuchSection`] if `index` is out of range.
    pub fn set_section_size(&mut self, index: usize, size: u32) -> Result<(), ElfError> {
        self.section_mut(index)?.header.sh_size = size;
        Ok(())
    }

    /// Records that a section's contents were written at `offset` by the
    /// caller, so the copy operations skip it.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::NoSuchSection`] if `index` is out of range.
    pub fn mark_section_copied(&mut self, index: usize, offset: u32) -> Result<(), ElfError> {
        let section = self.section_mut(index)?;
        section.header.sh_offset = offset;
        section.copied = true;
        Ok(())
    }

    /// Writes the program header table at its original offset.
    pub fn write_program_headers(&self, out: &mut OutputImage) {
        let start = self.header.e_phoff as usize;
        // Bounds were checked by `open`.
        let end = start + usize::from(self.header.e_phnum) * ELF32_PHDR_SIZE;
        out.write_at(start, &self.data[start..end]);
    }

    /// Writes the section header table at the first 4-byte-aligned offset at
    /// or after `offset`, points `e_shoff` at it and truncates the image
    /// after it. Returns the final file length.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidOffset`] if the table would overflow.
    pub fn write_section_headers(
        &self,
        out: &mut OutputImage,
        offset: u32,
    ) -> Result<u32, ElfError> {
        if self.sections.is_empty() {
            out.write_u32_at(E_SHOFF_OFFSET, 0);
            out.set_len(offset as usize);
            return Ok(offset);
        }

        let start = align_up(offset, SHDR_TABLE_ALIGN)?;
        let mut pos = start as usize;
        for section in &self.sections {
            out.write_at(pos, &section.header.to_bytes());
            pos += ELF32_SHDR_SIZE;
        }
        let end = u32::try_from(pos).map_err(|_| ElfError::InvalidOffset)?;
        out.write_u32_at(E_SHOFF_OFFSET, start);
        out.set_len(pos);
        debug!(shoff = start, end, "wrote section header table");
        Ok(end)
    }

    fn section_mut(&mut self, index: usize) -> Result<&mut Section, ElfError> {
        self.sections
            .get_mut(index)
            .ok_or(ElfError::NoSuchSection { index })
    }
}

/// Rounds `value` up to a multiple of `align`.
fn align_up(value: u32, align: u32) -> Result<u32, ElfError> {
    value
        .checked_next_multiple_of(align.max(1))
        .ok_or(ElfError::InvalidOffset)
}
