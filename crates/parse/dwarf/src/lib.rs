//! DWARF `.debug_line` codec for lineslim.
//!
//! Decodes DWARF v2 to v4 line number programs into rows, removes redundant
//! rows, and re-encodes a compact equivalent program. The `.debug_info`
//! walker locates the `DW_AT_stmt_list` attributes that point compile units
//! at their line programs.
//!
//! # Usage
//!
//! ```no_run
//! use lineslim_dwarf::{StmtLists, decode, line_unit, optimize};
//!
//! fn shrink(info: &[u8], abbrev: &[u8], line: &[u8]) -> Result<(), lineslim_dwarf::DwarfError> {
//!     for stmt in StmtLists::new(info, abbrev) {
//!         let unit = line_unit(line, stmt?.line_offset)?;
//!         let program = decode(unit)?;
//!         let mut rows = program.rows.clone();
//!         optimize(&mut rows);
//!         let _bytes = program.encode(&rows)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod abbrev;
pub mod encode;
pub mod header;
pub mod info;
pub mod leb128;
pub mod optimize;
pub mod program;
pub mod reader;

pub use abbrev::{Abbreviation, Abbreviations, AttributeSpec, Form};
pub use encode::encode;
pub use header::{DwarfError, FileEntry, LineParams, LineProgramHeader};
pub use info::{CompileUnitHeader, DW_AT_STMT_LIST, StmtListRef, StmtLists};
pub use optimize::optimize;
pub use program::{LineMachine, LineProgram, LineRow, Step, decode};
pub use reader::Reader;

/// Returns the complete line program unit starting at `offset` in `.debug_line`.
///
/// # Errors
///
/// - [`DwarfError::LineOffsetOutOfBounds`] if `offset` lies outside the section.
/// - [`DwarfError::Dwarf64Unsupported`] for a 64-bit unit.
/// - [`DwarfError::Truncated`] if the unit runs past the section.
pub fn line_unit(debug_line: &[u8], offset: u32) -> Result<&[u8], DwarfError> {
    let start = offset as usize;
    let rest = debug_line
        .get(start..)
        .filter(|rest| rest.len() >= 4)
        .ok_or(DwarfError::LineOffsetOutOfBounds(offset))?;
    let unit_length = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
    if unit_length >= 0xffff_fff0 {
        return Err(DwarfError::Dwarf64Unsupported);
    }
    rest.get(..4 + unit_length as usize)
        .ok_or(DwarfError::Truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_unit_slices_by_length() {
        let mut section = vec![0xaa, 0xbb];
        section.extend_from_slice(&3u32.to_le_bytes());
        section.extend_from_slice(&[1, 2, 3, 4, 5]);

        assert_eq!(line_unit(&section, 2), Ok(&section[2..9]));
        assert_eq!(
            line_unit(&section, 9),
            Err(DwarfError::LineOffsetOutOfBounds(9))
        );
        assert_eq!(
            line_unit(&section, 100),
            Err(DwarfError::LineOffsetOutOfBounds(100))
        );
        section.truncate(7);
        assert_eq!(line_unit(&section, 2), Err(DwarfError::Truncated));
    }
}
