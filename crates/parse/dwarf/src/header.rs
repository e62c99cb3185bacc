//! DWARF line program header parsing.
//!
//! Parses the header of a `.debug_line` compilation unit, including the
//! directory table and file table. Supports DWARF v2, v3 and v4 formats;
//! the v4 header is normalized to the v3 shape so the rest of the codec is
//! version-uniform.

use std::ops::Range;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::reader::Reader;

/// Size of the fixed fields shared by v2/v3 headers (min_inst, default_is_stmt,
/// line_base, line_range, opcode_base).
pub const V3_FIXED_HEADER_SIZE: u32 = 5;

/// Extra bytes a v4 header carries (`maximum_operations_per_instruction`).
const V4_EXTRA_FIELD_SIZE: u32 = 1;

/// Errors that can occur when decoding or encoding DWARF data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DwarfError {
    /// The input data is too short for the declared structure.
    #[error("DWARF data truncated")]
    Truncated,
    /// An unsupported DWARF version was encountered.
    #[error("unsupported DWARF version {0}")]
    UnsupportedVersion(u16),
    /// A header field holds a value the codec cannot work with.
    #[error("invalid line program header: {0}")]
    InvalidHeader(&'static str),
    /// An attribute form the debug-info walker cannot size.
    #[error("unknown DWARF attribute form {0:#x}")]
    UnknownForm(u64),
    /// A line sequence did not terminate with `DW_LNE_end_sequence`.
    #[error("line sequence does not end with DW_LNE_end_sequence")]
    MalformedSequence,
    /// The 64-bit DWARF format is not supported.
    #[error("64-bit DWARF is not supported")]
    Dwarf64Unsupported,
    /// A `DW_AT_stmt_list` value points outside `.debug_line`.
    #[error("DW_AT_stmt_list offset {0:#x} lies outside .debug_line")]
    LineOffsetOutOfBounds(u32),
}

/// The header parameters that drive opcode arithmetic, independent of version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineParams {
    /// Minimum instruction length; address advances are multiples of this.
    pub minimum_instruction_length: u8,
    /// Default value of the `is_stmt` register.
    pub default_is_stmt: bool,
    /// Line base for special opcodes.
    pub line_base: i8,
    /// Line range for special opcodes.
    pub line_range: u8,
    /// First special opcode number.
    pub opcode_base: u8,
}

impl LineParams {
    /// Address advance, in operation units, of `DW_LNS_const_add_pc`.
    #[must_use]
    pub fn const_add_pc_units(&self) -> u32 {
        u32::from(255 - self.opcode_base) / u32::from(self.line_range)
    }

    /// Address advance, in bytes, of `DW_LNS_const_add_pc`.
    #[must_use]
    pub fn const_add_pc_delta(&self) -> u32 {
        self.const_add_pc_units() * u32::from(self.minimum_instruction_length)
    }

    fn validate(&self) -> Result<(), DwarfError> {
        if self.minimum_instruction_length == 0 {
            return Err(DwarfError::InvalidHeader("minimum_instruction_length is zero"));
        }
        if self.line_range == 0 {
            return Err(DwarfError::InvalidHeader("line_range is zero"));
        }
        Ok(())
    }
}

/// A file entry from the line program header or a `DW_LNE_define_file` opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// File name as stored in the table.
    pub name: String,
    /// Directory index: 0 is the compilation directory, otherwise 1-based.
    pub directory_index: u64,
    /// Modification time (0 when unknown).
    pub mtime: u64,
    /// File size in bytes (0 when unknown).
    pub size: u64,
    /// Absolute path, or the joined path when it could not be resolved.
    pub path: PathBuf,
}

/// A parsed DWARF line program header.
#[derive(Debug, Clone)]
pub struct LineProgramHeader {
    /// DWARF version as stored in the unit (2, 3 or 4).
    pub version: u16,
    /// Unit length, normalized to the v3 header shape.
    pub unit_length: u32,
    /// Header length, normalized to the v3 header shape.
    pub header_length: u32,
    /// Opcode arithmetic parameters.
    pub params: LineParams,
    /// Number of LEB128 operands for each standard opcode `1..opcode_base`.
    pub standard_opcode_lengths: Vec<u8>,
    /// Include directory table (index 1 is the first entry).
    pub include_directories: Vec<String>,
    /// File table (index 1 is the first entry).
    pub files: Vec<FileEntry>,
    /// Opcode length table plus directory and file tables, relative to the unit.
    pub(crate) tables: Range<usize>,
    /// Line program bytecode, relative to the unit.
    pub(crate) program: Range<usize>,
}

impl LineProgramHeader {
    /// Parse a line program header from the start of a compilation unit.
    ///
    /// `data` should start at the beginning of a `.debug_line` unit
    /// (i.e., at the `unit_length` field) and may extend past it.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError`] if the data is malformed or uses an unsupported version.
    pub fn parse(data: &[u8]) -> Result<Self, DwarfError> {
        let mut r = Reader::new(data);
        let mut unit_length = r.read_u32()?;
        if unit_length >= 0xffff_fff0 {
            return Err(DwarfError::Dwarf64Unsupported);
        }
        let mut unit = r.bounded(unit_length as usize)?;

        let version = unit.read_u16()?;
        if !(2..=4).contains(&version) {
            return Err(DwarfError::UnsupportedVersion(version));
        }
        let mut header_length = unit.read_u32()?;
        let program_start = unit
            .position()
            .checked_add(header_length as usize)
            .filter(|&p| p <= unit.end())
            .ok_or(DwarfError::Truncated)?;

        let minimum_instruction_length = unit.read_u8()?;
        if version == 4 {
            let maximum_operations_per_instruction = unit.read_u8()?;
            if maximum_operations_per_instruction != 1 {
                return Err(DwarfError::InvalidHeader(
                    "maximum_operations_per_instruction must be 1",
                ));
            }
            // Present the unit as if it had the 5-field v3 header.
            unit_length -= V4_EXTRA_FIELD_SIZE;
            header_length = header_length
                .checked_sub(V4_EXTRA_FIELD_SIZE)
                .ok_or(DwarfError::Truncated)?;
        }
        #[expect(clippy::cast_possible_wrap, reason = "line_base is a signed byte")]
        let params = LineParams {
            minimum_instruction_length,
            default_is_stmt: unit.read_u8()? != 0,
            line_base: unit.read_u8()? as i8,
            line_range: unit.read_u8()?,
            opcode_base: unit.read_u8()?,
        };
        params.validate()?;

        let tables_start = unit.position();
        let num_standard = usize::from(params.opcode_base.saturating_sub(1));
        let standard_opcode_lengths = unit.read_bytes(num_standard)?.to_vec();

        let include_directories = parse_directories(&mut unit)?;
        let mut files = Vec::new();
        while let Some(file) = parse_file_entry(&mut unit, &include_directories)? {
            files.push(file);
        }
        let tables_end = unit.position();
        if tables_end > program_start {
            return Err(DwarfError::InvalidHeader("file table overruns header_length"));
        }

        Ok(Self {
            version,
            unit_length,
            header_length,
            params,
            standard_opcode_lengths,
            include_directories,
            files,
            tables: tables_start..tables_end,
            program: program_start..unit.end(),
        })
    }

    /// Version written back by the encoder: v4 units are emitted as v3.
    #[must_use]
    pub fn output_version(&self) -> u16 {
        self.version.min(3)
    }

    /// Returns the file entry at the given 1-based index.
    #[must_use]
    pub fn file(&self, file_index: u64) -> Option<&FileEntry> {
        let idx = usize::try_from(file_index.checked_sub(1)?).ok()?;
        self.files.get(idx)
    }
}

/// Parse the include directory table (NUL-terminated strings, terminated by an empty string).
fn parse_directories(r: &mut Reader<'_>) -> Result<Vec<String>, DwarfError> {
    let mut directories = Vec::new();
    loop {
        let dir = r.read_cstr()?;
        if dir.is_empty() {
            return Ok(directories);
        }
        directories.push(String::from_utf8_lossy(dir).into_owned());
    }
}

/// Parse one file entry; `None` marks the empty-name table terminator.
///
/// Shared by the header's file table and `DW_LNE_define_file`.
pub(crate) fn parse_file_entry(
    r: &mut Reader<'_>,
    directories: &[String],
) -> Result<Option<FileEntry>, DwarfError> {
    let name = r.read_cstr()?;
    if name.is_empty() {
        return Ok(None);
    }
    let name = String::from_utf8_lossy(name).into_owned();
    let directory_index = r.read_uleb128()?;
    let mtime = r.read_uleb128()?;
    let size = r.read_uleb128()?;
    let path = resolve_path(&name, directory_index, directories);
    Ok(Some(FileEntry {
        name,
        directory_index,
        mtime,
        size,
        path,
    }))
}

/// Joins a file name with its directory and makes it absolute.
///
/// Paths that cannot be resolved are kept as they are.
fn resolve_path(name: &str, directory_index: u64, directories: &[String]) -> PathBuf {
    let joined = if directory_index == 0 {
        PathBuf::from(name)
    } else {
        let dir = usize::try_from(directory_index - 1)
            .ok()
            .and_then(|i| directories.get(i));
        match dir {
            Some(dir) => Path::new(dir).join(name),
            None => {
                warn!(name, directory_index, "file directory index out of range");
                return PathBuf::from(name);
            }
        }
    };
    match std::path::absolute(&joined) {
        Ok(path) => path,
        Err(err) => {
            debug!(path = %joined.display(), %err, "ignoring invalid path");
            joined
        }
    }
}
