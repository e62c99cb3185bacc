//! ELF32 little-endian container model for lineslim.
//!
//! Parses the file header, program headers and section headers of an ELF32
//! file, and rewrites the file into an [`OutputImage`] section by section.
//! Sections inside the region covered by program headers keep their file
//! offsets; the rest are packed after it, each at its own alignment.
//!
//! # Usage
//!
//! ```no_run
//! use lineslim_elf::{ElfContainer, OutputImage};
//!
//! fn repack(data: &[u8]) -> Result<Vec<u8>, lineslim_elf::ElfError> {
//!     let mut elf = ElfContainer::open(data)?;
//!     let mut out = OutputImage::with_capacity(data.len());
//!     let start = elf.copy_fixed_sections(&mut out)?;
//!     let end = elf.copy_sections(&mut out, start)?;
//!     elf.write_program_headers(&mut out);
//!     elf.write_section_headers(&mut out, end)?;
//!     Ok(out.into_inner())
//! }
//! ```

pub mod container;
pub mod header;
pub mod image;
pub mod section;
pub mod segment;

pub use container::{ElfContainer, Section, SectionInfo};
pub use header::{ELF32_EHDR_SIZE, ELF32_PHDR_SIZE, ELF32_SHDR_SIZE, Elf32Header, ElfError};
pub use image::OutputImage;
pub use section::{
    Elf32SectionHeader, SHT_NOBITS, SHT_NULL, SHT_PROGBITS, SHT_STRTAB, StringTable,
    section_headers,
};
pub use segment::{Elf32ProgramHeader, PT_LOAD, fixed_region_end, program_headers};
