//! `.debug_abbrev` abbreviation tables.

use std::collections::HashMap;

use crate::header::DwarfError;
use crate::reader::Reader;

/// Attribute value encodings understood by the `.debug_info` walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// `DW_FORM_addr`: a target address of `address_size` bytes.
    Addr,
    /// `DW_FORM_block2`.
    Block2,
    /// `DW_FORM_block4`.
    Block4,
    /// `DW_FORM_data2`.
    Data2,
    /// `DW_FORM_data4`.
    Data4,
    /// `DW_FORM_data8`.
    Data8,
    /// `DW_FORM_string`: an inline NUL-terminated string.
    String,
    /// `DW_FORM_block`.
    Block,
    /// `DW_FORM_block1`.
    Block1,
    /// `DW_FORM_data1`.
    Data1,
    /// `DW_FORM_flag`.
    Flag,
    /// `DW_FORM_sdata`.
    Sdata,
    /// `DW_FORM_strp`.
    Strp,
    /// `DW_FORM_udata`.
    Udata,
    /// `DW_FORM_ref_addr`.
    RefAddr,
    /// `DW_FORM_ref1`.
    Ref1,
    /// `DW_FORM_ref2`.
    Ref2,
    /// `DW_FORM_ref4`.
    Ref4,
    /// `DW_FORM_ref8`.
    Ref8,
    /// `DW_FORM_ref_udata`.
    RefUdata,
    /// `DW_FORM_indirect`: the real form precedes the value.
    Indirect,
    /// `DW_FORM_sec_offset`.
    SecOffset,
    /// `DW_FORM_exprloc`.
    Exprloc,
    /// `DW_FORM_flag_present`: no value bytes.
    FlagPresent,
    /// `DW_FORM_ref_sig8`.
    RefSig8,
    /// Any other form code.
    Unknown(u64),
}

impl From<u64> for Form {
    fn from(code: u64) -> Self {
        match code {
            0x01 => Self::Addr,
            0x03 => Self::Block2,
            0x04 => Self::Block4,
            0x05 => Self::Data2,
            0x06 => Self::Data4,
            0x07 => Self::Data8,
            0x08 => Self::String,
            0x09 => Self::Block,
            0x0a => Self::Block1,
            0x0b => Self::Data1,
            0x0c => Self::Flag,
            0x0d => Self::Sdata,
            0x0e => Self::Strp,
            0x0f => Self::Udata,
            0x10 => Self::RefAddr,
            0x11 => Self::Ref1,
            0x12 => Self::Ref2,
            0x13 => Self::Ref4,
            0x14 => Self::Ref8,
            0x15 => Self::RefUdata,
            0x16 => Self::Indirect,
            0x17 => Self::SecOffset,
            0x18 => Self::Exprloc,
            0x19 => Self::FlagPresent,
            0x20 => Self::RefSig8,
            other => Self::Unknown(other),
        }
    }
}

/// An attribute name and the form its value is encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    /// `DW_AT_*` code.
    pub name: u64,
    /// Value encoding.
    pub form: Form,
}

/// One abbreviation declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abbreviation {
    /// Abbreviation code referenced by debugging information entries.
    pub code: u64,
    /// `DW_TAG_*` code.
    pub tag: u64,
    /// Whether entries using this abbreviation own children.
    pub has_children: bool,
    /// Attributes in declaration order.
    pub attributes: Vec<AttributeSpec>,
}

/// The abbreviation table starting at one `.debug_abbrev` offset.
#[derive(Debug, Clone, Default)]
pub struct Abbreviations {
    by_code: HashMap<u64, Abbreviation>,
}

impl Abbreviations {
    /// Parses the table at `offset` up to its terminating zero code.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if the table runs past the section.
    pub fn parse(debug_abbrev: &[u8], offset: usize) -> Result<Self, DwarfError> {
        let mut r = Reader::at(debug_abbrev, offset)?;
        let mut by_code = HashMap::new();
        loop {
            let code = r.read_uleb128()?;
            if code == 0 {
                break;
            }
            let tag = r.read_uleb128()?;
            let has_children = r.read_u8()? != 0;
            let mut attributes = Vec::new();
            loop {
                let name = r.read_uleb128()?;
                let form = r.read_uleb128()?;
                if name == 0 && form == 0 {
                    break;
                }
                attributes.push(AttributeSpec {
                    name,
                    form: Form::from(form),
                });
            }
            by_code.insert(
                code,
                Abbreviation {
                    code,
                    tag,
                    has_children,
                    attributes,
                },
            );
        }
        Ok(Self { by_code })
    }

    /// Looks up an abbreviation by code.
    #[must_use]
    pub fn get(&self, code: u64) -> Option<&Abbreviation> {
        self.by_code.get(&code)
    }

    /// Number of declarations in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Whether the table declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_codes() {
        assert_eq!(Form::from(0x01), Form::Addr);
        assert_eq!(Form::from(0x17), Form::SecOffset);
        assert_eq!(Form::from(0x19), Form::FlagPresent);
        assert_eq!(Form::from(0x20), Form::RefSig8);
        assert_eq!(Form::from(0x02), Form::Unknown(0x02));
        assert_eq!(Form::from(0x1f02), Form::Unknown(0x1f02));
    }

    #[test]
    fn parse_table() {
        let data = [
            0xaa, // padding before the table
            1, 0x11, 1, // code 1, DW_TAG_compile_unit, children
            0x03, 0x08, // DW_AT_name, string
            0x10, 0x17, // DW_AT_stmt_list, sec_offset
            0, 0, //
            2, 0x2e, 0, // code 2, DW_TAG_subprogram, no children
            0x3f, 0x19, // DW_AT_external, flag_present
            0, 0, //
            0, // end of table
        ];
        let table = Abbreviations::parse(&data, 1).unwrap();
        assert_eq!(table.len(), 2);

        let cu = table.get(1).unwrap();
        assert_eq!(cu.tag, 0x11);
        assert!(cu.has_children);
        assert_eq!(
            cu.attributes,
            [
                AttributeSpec {
                    name: 0x03,
                    form: Form::String
                },
                AttributeSpec {
                    name: 0x10,
                    form: Form::SecOffset
                },
            ]
        );

        let sub = table.get(2).unwrap();
        assert!(!sub.has_children);
        assert_eq!(sub.attributes.len(), 1);
        assert!(table.get(3).is_none());
    }

    #[test]
    fn truncated_table() {
        assert_eq!(
            Abbreviations::parse(&[1, 0x11, 1, 0x03], 0).unwrap_err(),
            DwarfError::Truncated
        );
        assert!(Abbreviations::parse(&[0], 2).is_err());
    }
}
