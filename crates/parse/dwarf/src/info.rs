//! `.debug_info` walker locating `DW_AT_stmt_list` values.
//!
//! Only the root entry of each compile unit is inspected. Its attributes are
//! skipped by form until `DW_AT_stmt_list` is reached; attributes after it are
//! never read.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;

use crate::abbrev::{Abbreviations, Form};
use crate::header::DwarfError;
use crate::reader::Reader;

/// `DW_AT_stmt_list`.
pub const DW_AT_STMT_LIST: u64 = 0x10;

/// A DWARF32 compile unit header (versions 2 to 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileUnitHeader {
    /// Length of the unit, not counting this field.
    pub unit_length: u32,
    /// DWARF version.
    pub version: u16,
    /// Offset of the unit's abbreviation table in `.debug_abbrev`.
    pub debug_abbrev_offset: u32,
    /// Size in bytes of a target address.
    pub address_size: u8,
}

impl CompileUnitHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 11;

    /// Parses a compile unit header at the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError`] on truncation, 64-bit DWARF, or a version
    /// outside 2 to 4.
    pub fn parse(r: &mut Reader<'_>) -> Result<Self, DwarfError> {
        let unit_length = r.read_u32()?;
        if unit_length >= 0xffff_fff0 {
            return Err(DwarfError::Dwarf64Unsupported);
        }
        let version = r.read_u16()?;
        if !(2..=4).contains(&version) {
            return Err(DwarfError::UnsupportedVersion(version));
        }
        Ok(Self {
            unit_length,
            version,
            debug_abbrev_offset: r.read_u32()?,
            address_size: r.read_u8()?,
        })
    }

    /// Total size of the unit including the length field.
    #[must_use]
    pub fn total_size(&self) -> usize {
        4 + self.unit_length as usize
    }
}

/// Location of one `DW_AT_stmt_list` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StmtListRef {
    /// Offset of the compile unit within `.debug_info`.
    pub unit_offset: usize,
    /// Offset of the 4-byte attribute value within `.debug_info`.
    pub value_offset: usize,
    /// The referenced offset within `.debug_line`.
    pub line_offset: u32,
}

/// Iterator over the `DW_AT_stmt_list` values of every compile unit.
///
/// Compile units whose root entry has no `DW_AT_stmt_list` are skipped.
/// Iteration stops after the first error.
pub struct StmtLists<'a> {
    debug_info: &'a [u8],
    debug_abbrev: &'a [u8],
    offset: usize,
    tables: HashMap<u32, Abbreviations>,
    failed: bool,
}

impl<'a> StmtLists<'a> {
    /// Creates a walker over the given sections.
    #[must_use]
    pub fn new(debug_info: &'a [u8], debug_abbrev: &'a [u8]) -> Self {
        Self {
            debug_info,
            debug_abbrev,
            offset: 0,
            tables: HashMap::new(),
            failed: false,
        }
    }

    /// Reads the compile unit at `self.offset` and advances past it.
    fn next_unit(&mut self) -> Result<Option<StmtListRef>, DwarfError> {
        let unit_offset = self.offset;
        let mut r = Reader::at(self.debug_info, unit_offset)?;
        let cu = CompileUnitHeader::parse(&mut r)?;
        let unit = Reader::at(self.debug_info, unit_offset)?.bounded(cu.total_size())?;
        self.offset = unit.end();

        let mut r = unit;
        r.skip(CompileUnitHeader::SIZE)?;
        let code = r.read_uleb128()?;
        if code == 0 {
            debug!(unit_offset, "compile unit without a root entry");
            return Ok(None);
        }

        let abbrevs = match self.tables.entry(cu.debug_abbrev_offset) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(Abbreviations::parse(
                self.debug_abbrev,
                cu.debug_abbrev_offset as usize,
            )?),
        };
        let abbrev = abbrevs
            .get(code)
            .ok_or(DwarfError::InvalidHeader("unknown abbreviation code"))?;

        for spec in &abbrev.attributes {
            if spec.name == DW_AT_STMT_LIST {
                let form = resolve_indirect(&mut r, spec.form)?;
                if !matches!(form, Form::Data4 | Form::SecOffset) {
                    return Err(DwarfError::InvalidHeader(
                        "DW_AT_stmt_list is not a 4-byte offset",
                    ));
                }
                let value_offset = r.position();
                let line_offset = r.read_u32()?;
                return Ok(Some(StmtListRef {
                    unit_offset,
                    value_offset,
                    line_offset,
                }));
            }
            skip_form(&mut r, spec.form, &cu)?;
        }

        debug!(unit_offset, "compile unit without DW_AT_stmt_list");
        Ok(None)
    }
}

impl Iterator for StmtLists<'_> {
    type Item = Result<StmtListRef, DwarfError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed && self.offset < self.debug_info.len() {
            match self.next_unit() {
                Ok(Some(found)) => return Some(Ok(found)),
                Ok(None) => {}
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

/// Follows `DW_FORM_indirect` chains to the real form.
fn resolve_indirect(r: &mut Reader<'_>, mut form: Form) -> Result<Form, DwarfError> {
    while form == Form::Indirect {
        form = Form::from(r.read_uleb128()?);
    }
    Ok(form)
}

/// Advances the cursor past one attribute value.
fn skip_form(r: &mut Reader<'_>, form: Form, cu: &CompileUnitHeader) -> Result<(), DwarfError> {
    let len = match form {
        Form::Indirect => {
            let actual = Form::from(r.read_uleb128()?);
            return skip_form(r, actual, cu);
        }
        Form::FlagPresent => 0,
        Form::Data1 | Form::Ref1 | Form::Flag => 1,
        Form::Data2 | Form::Ref2 => 2,
        Form::Data4 | Form::Ref4 | Form::Strp | Form::SecOffset => 4,
        Form::Data8 | Form::Ref8 | Form::RefSig8 => 8,
        Form::Addr => usize::from(cu.address_size),
        Form::RefAddr if cu.version == 2 => usize::from(cu.address_size),
        Form::RefAddr => 4,
        Form::Sdata => {
            r.read_sleb128()?;
            0
        }
        Form::Udata | Form::RefUdata => {
            r.read_uleb128()?;
            0
        }
        Form::String => {
            r.read_cstr()?;
            0
        }
        Form::Block1 => usize::from(r.read_u8()?),
        Form::Block2 => usize::from(r.read_u16()?),
        Form::Block4 => r.read_u32()? as usize,
        Form::Block | Form::Exprloc => {
            usize::try_from(r.read_uleb128()?).map_err(|_| DwarfError::Truncated)?
        }
        Form::Unknown(code) => return Err(DwarfError::UnknownForm(code)),
    };
    r.skip(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Abbreviation table 1: compile unit with name (string), producer (strp),
    /// low_pc (addr), a block1, stmt_list (sec_offset), then comp_dir (string).
    fn make_abbrev() -> Vec<u8> {
        vec![
            1, 0x11, 1, // code 1, DW_TAG_compile_unit, children
            0x03, 0x08, // DW_AT_name, string
            0x25, 0x0e, // DW_AT_producer, strp
            0x11, 0x01, // DW_AT_low_pc, addr
            0x40, 0x0a, // DW_AT_frame_base, block1
            0x10, 0x17, // DW_AT_stmt_list, sec_offset
            0x1b, 0x08, // DW_AT_comp_dir, string
            0, 0, //
            2, 0x11, 0, // code 2, compile unit without stmt_list
            0x03, 0x08, //
            0, 0, //
            0,
        ]
    }

    /// Build one compile unit using abbreviation code 1.
    fn make_cu(version: u16, stmt_list: u32) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&version.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes()); // debug_abbrev_offset
        body.push(4); // address_size
        body.push(1); // abbrev code
        body.extend_from_slice(b"main.c\0");
        body.extend_from_slice(&0x1234u32.to_le_bytes());
        body.extend_from_slice(&0x0800_0000u32.to_le_bytes());
        body.extend_from_slice(&[2, 0x91, 0x00]);
        body.extend_from_slice(&stmt_list.to_le_bytes());
        body.extend_from_slice(b"/src\0");
        body.push(0); // end of children

        let mut cu = u32::try_from(body.len()).unwrap().to_le_bytes().to_vec();
        cu.extend_from_slice(&body);
        cu
    }

    /// Offset of the stmt_list value within a unit built by [`make_cu`].
    const STMT_LIST_VALUE_OFFSET: usize = 11 + 1 + 7 + 4 + 4 + 3;

    #[test]
    fn finds_stmt_list_in_each_unit() {
        let mut info = make_cu(4, 0x40);
        let second = info.len();
        info.extend_from_slice(&make_cu(3, 0x80));

        let refs: Vec<_> = StmtLists::new(&info, &make_abbrev())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            refs,
            [
                StmtListRef {
                    unit_offset: 0,
                    value_offset: STMT_LIST_VALUE_OFFSET,
                    line_offset: 0x40,
                },
                StmtListRef {
                    unit_offset: second,
                    value_offset: second + STMT_LIST_VALUE_OFFSET,
                    line_offset: 0x80,
                },
            ]
        );
    }

    #[test]
    fn unit_without_stmt_list_is_skipped() {
        let mut info = Vec::new();
        let mut body = vec![4, 0, 0, 0, 0, 0, 4, 2];
        body.extend_from_slice(b"asm.s\0");
        info.extend_from_slice(&u32::try_from(body.len()).unwrap().to_le_bytes());
        info.extend_from_slice(&body);
        let second = info.len();
        info.extend_from_slice(&make_cu(4, 0));

        let refs: Vec<_> = StmtLists::new(&info, &make_abbrev())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].unit_offset, second);
    }

    #[test]
    fn indirect_form_is_followed() {
        let abbrev = [1, 0x11, 0, 0x03, 0x16, 0x10, 0x17, 0, 0, 0];
        let mut body = vec![4, 0, 0, 0, 0, 0, 4, 1];
        body.extend_from_slice(&[0x0b, 0x7f]); // indirect -> data1
        body.extend_from_slice(&0x20u32.to_le_bytes());
        let mut info = u32::try_from(body.len()).unwrap().to_le_bytes().to_vec();
        info.extend_from_slice(&body);

        let found = StmtLists::new(&info, &abbrev).next().unwrap().unwrap();
        assert_eq!(found.line_offset, 0x20);
        assert_eq!(found.value_offset, 14);
    }

    #[test]
    fn ref_addr_width_depends_on_version() {
        let abbrev = [1, 0x11, 0, 0x01, 0x10, 0x10, 0x06, 0, 0, 0];
        for (version, address_size, width) in [(2u16, 8u8, 8usize), (3, 8, 4)] {
            let mut body = version.to_le_bytes().to_vec();
            body.extend_from_slice(&[0, 0, 0, 0, address_size, 1]);
            body.extend_from_slice(&vec![0xee; width]);
            body.extend_from_slice(&7u32.to_le_bytes());
            let mut info = u32::try_from(body.len()).unwrap().to_le_bytes().to_vec();
            info.extend_from_slice(&body);

            let found = StmtLists::new(&info, &abbrev).next().unwrap().unwrap();
            assert_eq!(found.line_offset, 7, "version {version}");
        }
    }

    #[test]
    fn unknown_form_is_fatal() {
        let abbrev = [1, 0x11, 0, 0x03, 0x02, 0x10, 0x17, 0, 0, 0];
        let mut body = vec![4, 0, 0, 0, 0, 0, 4, 1, 0, 0, 0, 0];
        let mut info = u32::try_from(body.len()).unwrap().to_le_bytes().to_vec();
        info.append(&mut body);

        let mut walker = StmtLists::new(&info, &abbrev);
        assert_eq!(walker.next(), Some(Err(DwarfError::UnknownForm(0x02))));
        assert_eq!(walker.next(), None);
    }

    #[test]
    fn rejects_dwarf5_and_dwarf64() {
        let info = make_cu(5, 0);
        assert_eq!(
            StmtLists::new(&info, &make_abbrev()).next(),
            Some(Err(DwarfError::UnsupportedVersion(5)))
        );
        let info = [0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0];
        assert_eq!(
            StmtLists::new(&info, &make_abbrev()).next(),
            Some(Err(DwarfError::Dwarf64Unsupported))
        );
    }

    #[test]
    fn abbreviation_tables_are_cached() {
        let mut info = make_cu(4, 0);
        info.extend_from_slice(&make_cu(4, 0x10));
        let abbrev = make_abbrev();
        let mut walker = StmtLists::new(&info, &abbrev);
        assert_eq!(walker.by_ref().count(), 2);
        assert_eq!(walker.tables.len(), 1);
    }
}
