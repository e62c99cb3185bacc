//! Line number program encoder.
//!
//! Emits a compact opcode stream that reproduces a row sequence when decoded
//! by [`crate::program::decode`], preceded by a v2/v3-shaped unit header whose
//! tables are copied verbatim from the decoded unit.

use crate::header::{DwarfError, LineParams, V3_FIXED_HEADER_SIZE};
use crate::leb128::{uleb128_len, write_sleb128, write_uleb128};
use crate::program::{
    DW_LNE_END_SEQUENCE, DW_LNE_MARKER, DW_LNE_SET_ADDRESS, DW_LNE_SET_DISCRIMINATOR,
    DW_LNS_ADVANCE_LINE, DW_LNS_ADVANCE_PC, DW_LNS_CONST_ADD_PC, DW_LNS_COPY,
    DW_LNS_NEGATE_STMT, DW_LNS_SET_COLUMN, DW_LNS_SET_FILE, LineProgram, LineRow,
};

/// Encodes a complete `.debug_line` unit.
///
/// `tables` holds the standard opcode lengths followed by the directory and
/// file tables, exactly as they should appear after the fixed header fields.
/// A version above 3 is written as 3, since the emitted header never carries
/// `maximum_operations_per_instruction`.
///
/// # Errors
///
/// - [`DwarfError::InvalidHeader`] if the parameters cannot express the
///   standard opcodes the encoder emits.
/// - [`DwarfError::MalformedSequence`] if the last row does not end a sequence.
pub fn encode(
    version: u16,
    params: &LineParams,
    tables: &[u8],
    rows: &[LineRow],
) -> Result<Vec<u8>, DwarfError> {
    if params.minimum_instruction_length == 0 || params.line_range == 0 {
        return Err(DwarfError::InvalidHeader("zero instruction length or line range"));
    }
    if params.opcode_base <= DW_LNS_CONST_ADD_PC {
        return Err(DwarfError::InvalidHeader("opcode_base too small"));
    }
    if rows.last().is_some_and(|row| !row.end_sequence) {
        return Err(DwarfError::MalformedSequence);
    }

    let header_length = u32::try_from(tables.len())
        .ok()
        .and_then(|len| len.checked_add(V3_FIXED_HEADER_SIZE))
        .ok_or(DwarfError::InvalidHeader("tables too large"))?;

    let mut out = Vec::with_capacity(16 + tables.len() + rows.len() * 2);
    // unit_length is patched once the program is complete.
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&version.min(3).to_le_bytes());
    out.extend_from_slice(&header_length.to_le_bytes());
    out.push(params.minimum_instruction_length);
    out.push(u8::from(params.default_is_stmt));
    out.extend_from_slice(&params.line_base.to_le_bytes());
    out.push(params.line_range);
    out.push(params.opcode_base);
    out.extend_from_slice(tables);

    let mut encoder = OpcodeWriter {
        out: &mut out,
        params: *params,
    };
    let mut last = LineRow::initial(params.default_is_stmt);
    for row in rows {
        encoder.row(&last, row);
        last = if row.end_sequence {
            LineRow::initial(params.default_is_stmt)
        } else {
            *row
        };
    }

    let unit_length = u32::try_from(out.len() - 4)
        .map_err(|_| DwarfError::InvalidHeader("unit too large"))?;
    out[..4].copy_from_slice(&unit_length.to_le_bytes());
    Ok(out)
}

impl LineProgram {
    /// Encodes `rows` with this unit's parameters and tables.
    ///
    /// # Errors
    ///
    /// See [`encode`].
    pub fn encode(&self, rows: &[LineRow]) -> Result<Vec<u8>, DwarfError> {
        encode(
            self.header.output_version(),
            &self.header.params,
            &self.tables,
            rows,
        )
    }
}

struct OpcodeWriter<'a> {
    out: &'a mut Vec<u8>,
    params: LineParams,
}

impl OpcodeWriter<'_> {
    /// Emits the opcodes that take the registers from `last` to `row`.
    fn row(&mut self, last: &LineRow, row: &LineRow) {
        if row.is_stmt != last.is_stmt {
            self.out.push(DW_LNS_NEGATE_STMT);
        }
        if row.discriminator != last.discriminator {
            let value = u64::from(row.discriminator);
            self.extended(1 + uleb128_len(value), DW_LNE_SET_DISCRIMINATOR);
            write_uleb128(self.out, value);
        }
        if row.file != last.file {
            self.out.push(DW_LNS_SET_FILE);
            write_uleb128(self.out, u64::from(row.file));
        }
        if row.column != last.column {
            self.out.push(DW_LNS_SET_COLUMN);
            write_uleb128(self.out, u64::from(row.column));
        }

        let mut line_delta = i64::from(row.line) - i64::from(last.line);
        let min_inst = u32::from(self.params.minimum_instruction_length);
        let byte_delta = row.address.wrapping_sub(last.address);
        let mut addr_delta = if row.address < last.address || byte_delta % min_inst != 0 {
            self.extended(5, DW_LNE_SET_ADDRESS);
            self.out.extend_from_slice(&row.address.to_le_bytes());
            0
        } else {
            u64::from(byte_delta / min_inst)
        };

        if row.end_sequence {
            if line_delta != 0 {
                self.advance_line(line_delta);
            }
            if addr_delta != 0 {
                self.advance_pc(addr_delta);
            }
            self.extended(1, DW_LNE_END_SEQUENCE);
            return;
        }

        let line_base = i64::from(self.params.line_base);
        let line_range = i64::from(self.params.line_range);
        if line_delta < line_base || line_delta >= line_base + line_range {
            self.advance_line(line_delta);
            line_delta = 0;
        }

        let const_add_pc = u64::from(self.params.const_add_pc_units());
        let mut retried = false;
        loop {
            if retried && addr_delta != 0 {
                self.advance_pc(addr_delta);
                addr_delta = 0;
            } else if addr_delta > const_add_pc {
                if addr_delta > 2 * const_add_pc {
                    self.advance_pc(addr_delta);
                    addr_delta = 0;
                } else {
                    self.out.push(DW_LNS_CONST_ADD_PC);
                    addr_delta -= const_add_pc;
                }
            }

            if line_delta == 0 && addr_delta == 0 {
                self.out.push(DW_LNS_COPY);
                return;
            }
            if let Some(opcode) = self.special_opcode(line_delta, addr_delta) {
                self.out.push(opcode);
                return;
            }
            if addr_delta == 0 {
                // Even a pure line advance does not fit a special opcode.
                self.advance_line(line_delta);
                self.out.push(DW_LNS_COPY);
                return;
            }
            retried = true;
        }
    }

    /// The special opcode for the given deltas, if it fits in a byte.
    fn special_opcode(&self, line_delta: i64, addr_delta: u64) -> Option<u8> {
        let line_base = i64::from(self.params.line_base);
        let line_range = i64::from(self.params.line_range);
        if line_delta < line_base || line_delta >= line_base + line_range {
            return None;
        }
        let addr_delta = i64::try_from(addr_delta).ok()?;
        let opcode = (line_delta - line_base)
            .checked_add(line_range.checked_mul(addr_delta)?)?
            .checked_add(i64::from(self.params.opcode_base))?;
        u8::try_from(opcode).ok()
    }

    fn extended(&mut self, length: usize, opcode: u8) {
        self.out.push(DW_LNE_MARKER);
        write_uleb128(self.out, length as u64);
        self.out.push(opcode);
    }

    fn advance_line(&mut self, delta: i64) {
        self.out.push(DW_LNS_ADVANCE_LINE);
        write_sleb128(self.out, delta);
    }

    fn advance_pc(&mut self, units: u64) {
        self.out.push(DW_LNS_ADVANCE_PC);
        write_uleb128(self.out, units);
    }
}
