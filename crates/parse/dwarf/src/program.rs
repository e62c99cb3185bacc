//! DWARF line number program state machine.
//!
//! Executes the opcode stream of one `.debug_line` unit and collects the
//! [`LineRow`] entries it commits. The machine also tracks
//! `DW_LNE_define_file` entries so the re-encoded header can carry them.

use tracing::debug;

use crate::header::{DwarfError, FileEntry, LineParams, LineProgramHeader, parse_file_entry};
use crate::reader::Reader;

// Standard opcodes
pub(crate) const DW_LNS_COPY: u8 = 1;
pub(crate) const DW_LNS_ADVANCE_PC: u8 = 2;
pub(crate) const DW_LNS_ADVANCE_LINE: u8 = 3;
pub(crate) const DW_LNS_SET_FILE: u8 = 4;
pub(crate) const DW_LNS_SET_COLUMN: u8 = 5;
pub(crate) const DW_LNS_NEGATE_STMT: u8 = 6;
pub(crate) const DW_LNS_CONST_ADD_PC: u8 = 8;
pub(crate) const DW_LNS_FIXED_ADVANCE_PC: u8 = 9;

// Extended opcode marker
pub(crate) const DW_LNE_MARKER: u8 = 0;
// Extended opcodes
pub(crate) const DW_LNE_END_SEQUENCE: u8 = 1;
pub(crate) const DW_LNE_SET_ADDRESS: u8 = 2;
pub(crate) const DW_LNE_DEFINE_FILE: u8 = 3;
pub(crate) const DW_LNE_SET_DISCRIMINATOR: u8 = 4;

/// A row emitted by the line number program state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRow {
    /// Machine code address.
    pub address: u32,
    /// Source line number.
    pub line: i32,
    /// File index (1-based).
    pub file: u32,
    /// Source column number (0 = unknown).
    pub column: u32,
    /// Block discriminator.
    pub discriminator: u32,
    /// Whether this row is a recommended breakpoint location.
    pub is_stmt: bool,
    /// Whether this row marks the end of a sequence of addresses.
    pub end_sequence: bool,
}

impl LineRow {
    /// Register values at the start of every sequence.
    #[must_use]
    pub fn initial(default_is_stmt: bool) -> Self {
        Self {
            address: 0,
            line: 1,
            file: 1,
            column: 0,
            discriminator: 0,
            is_stmt: default_is_stmt,
            end_sequence: false,
        }
    }
}

/// One step of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A row was committed.
    Row(LineRow),
    /// The opcode stream is exhausted.
    EndOfUnit,
}

/// A decoded line program unit.
#[derive(Debug, Clone)]
pub struct LineProgram {
    /// The parsed (version-normalized) header.
    pub header: LineProgramHeader,
    /// Rows in program order.
    pub rows: Vec<LineRow>,
    /// Header files followed by files added with `DW_LNE_define_file`.
    pub files: Vec<FileEntry>,
    /// Opcode length, directory and file tables ready to be emitted verbatim,
    /// with inline file definitions appended to the file table.
    pub tables: Vec<u8>,
}

/// Decodes a complete line program unit.
///
/// `unit` must start at the unit's `unit_length` field.
///
/// # Errors
///
/// Returns [`DwarfError`] if the header is invalid or an opcode runs past the
/// end of the unit.
pub fn decode(unit: &[u8]) -> Result<LineProgram, DwarfError> {
    let header = LineProgramHeader::parse(unit)?;
    let mut machine = LineMachine::new(&header, unit)?;
    let mut rows = Vec::new();
    while let Step::Row(row) = machine.step()? {
        rows.push(row);
    }
    let LineMachine {
        inline_files,
        inline_tables,
        ..
    } = machine;

    let mut tables = unit[header.tables.clone()].to_vec();
    if !inline_tables.is_empty() {
        // Re-terminate the file table after the appended entries.
        tables.pop();
        tables.extend_from_slice(&inline_tables);
        tables.push(0);
    }
    let mut files = header.files.clone();
    files.extend(inline_files);

    Ok(LineProgram {
        header,
        rows,
        files,
        tables,
    })
}

impl LineProgram {
    /// Returns the file entry at the given 1-based index.
    #[must_use]
    pub fn file(&self, file_index: u32) -> Option<&FileEntry> {
        let idx = usize::try_from(file_index.checked_sub(1)?).ok()?;
        self.files.get(idx)
    }
}

/// The line number program state machine for one unit.
pub struct LineMachine<'a> {
    reader: Reader<'a>,
    params: LineParams,
    standard_opcode_lengths: &'a [u8],
    directories: &'a [String],
    regs: LineRow,
    inline_files: Vec<FileEntry>,
    /// Raw bytes of the inline file entries, in file-table encoding.
    inline_tables: Vec<u8>,
}

impl<'a> LineMachine<'a> {
    /// Creates a machine positioned at the first opcode of `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if `unit` is shorter than the header claims.
    pub fn new(header: &'a LineProgramHeader, unit: &'a [u8]) -> Result<Self, DwarfError> {
        let mut reader = Reader::at(unit, header.program.start)?;
        reader = reader.bounded(header.program.len())?;
        Ok(Self {
            reader,
            params: header.params,
            standard_opcode_lengths: &header.standard_opcode_lengths,
            directories: &header.include_directories,
            regs: LineRow::initial(header.params.default_is_stmt),
            inline_files: Vec::new(),
            inline_tables: Vec::new(),
        })
    }

    /// Executes opcodes until a row is committed or the stream ends.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if an operand runs past the unit.
    pub fn step(&mut self) -> Result<Step, DwarfError> {
        while !self.reader.is_empty() {
            let opcode = self.reader.read_u8()?;
            let committed = if opcode >= self.params.opcode_base {
                Some(self.special(opcode))
            } else if opcode == DW_LNE_MARKER {
                self.extended()?
            } else {
                self.standard(opcode)?
            };
            if let Some(row) = committed {
                return Ok(Step::Row(row));
            }
        }
        Ok(Step::EndOfUnit)
    }

    fn special(&mut self, opcode: u8) -> LineRow {
        let adjusted = opcode - self.params.opcode_base;
        let line_range = self.params.line_range;
        let op_advance = u32::from(adjusted / line_range);
        self.advance_address(op_advance);
        let line_advance = i32::from(adjusted % line_range) + i32::from(self.params.line_base);
        self.regs.line = self.regs.line.wrapping_add(line_advance);
        self.regs
    }

    fn standard(&mut self, opcode: u8) -> Result<Option<LineRow>, DwarfError> {
        match opcode {
            DW_LNS_COPY => return Ok(Some(self.regs)),
            DW_LNS_ADVANCE_PC => {
                let units = low_u32(self.reader.read_uleb128()?);
                self.advance_address(units);
            }
            DW_LNS_ADVANCE_LINE => {
                let delta = low_i32(self.reader.read_sleb128()?);
                self.regs.line = self.regs.line.wrapping_add(delta);
            }
            DW_LNS_SET_FILE => self.regs.file = low_u32(self.reader.read_uleb128()?),
            DW_LNS_SET_COLUMN => self.regs.column = low_u32(self.reader.read_uleb128()?),
            DW_LNS_NEGATE_STMT => self.regs.is_stmt = !self.regs.is_stmt,
            DW_LNS_CONST_ADD_PC => {
                self.regs.address = self
                    .regs
                    .address
                    .wrapping_add(self.params.const_add_pc_delta());
            }
            DW_LNS_FIXED_ADVANCE_PC => {
                let delta = self.reader.read_u16()?;
                self.regs.address = self.regs.address.wrapping_add(u32::from(delta));
            }
            _ => {
                // set_basic_block, set_prologue_end, set_epilogue_begin,
                // set_isa and anything unknown: skip the declared operands.
                let operands = self
                    .standard_opcode_lengths
                    .get(usize::from(opcode) - 1)
                    .copied()
                    .unwrap_or(0);
                for _ in 0..operands {
                    self.reader.read_uleb128()?;
                }
            }
        }
        Ok(None)
    }

    fn extended(&mut self) -> Result<Option<LineRow>, DwarfError> {
        let length = usize::try_from(self.reader.read_uleb128()?)
            .map_err(|_| DwarfError::Truncated)?;
        if length == 0 {
            return Ok(None);
        }
        let mut body = self.reader.bounded(length)?;
        self.reader.skip(length)?;

        let sub_opcode = body.read_u8()?;
        match sub_opcode {
            DW_LNE_END_SEQUENCE => {
                let mut row = self.regs;
                row.end_sequence = true;
                self.regs = LineRow::initial(self.params.default_is_stmt);
                return Ok(Some(row));
            }
            DW_LNE_SET_ADDRESS => self.regs.address = body.read_u32()?,
            DW_LNE_DEFINE_FILE => {
                let mut raw = body.clone();
                if let Some(file) = parse_file_entry(&mut body, self.directories)? {
                    debug!(name = %file.name, "inline file definition");
                    let consumed = body.position() - raw.position();
                    self.inline_tables.extend_from_slice(raw.read_bytes(consumed)?);
                    self.inline_files.push(file);
                }
            }
            DW_LNE_SET_DISCRIMINATOR => {
                self.regs.discriminator = low_u32(body.read_uleb128()?);
            }
            other => debug!(opcode = other, length, "skipping unknown extended opcode"),
        }
        Ok(None)
    }

    fn advance_address(&mut self, op_advance: u32) {
        let delta = op_advance.wrapping_mul(u32::from(self.params.minimum_instruction_length));
        self.regs.address = self.regs.address.wrapping_add(delta);
    }
}

#[expect(clippy::cast_possible_truncation, reason = "registers are 32 bits wide")]
fn low_u32(value: u64) -> u32 {
    value as u32
}

#[expect(clippy::cast_possible_truncation, reason = "registers are 32 bits wide")]
fn low_i32(value: i64) -> i32 {
    value as i32
}
