//! In-memory ELF32 fixtures with DWARF line tables.

#![allow(dead_code)]

pub const SHT_PROGBITS: u32 = 1;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_NOBITS: u32 = 8;

/// Address of `.text` and of the first line sequence.
pub const TEXT_ADDR: u32 = 0x0804_8000;

/// One section of a fixture file.
pub struct Section {
    pub name: &'static str,
    pub sh_type: u32,
    pub align: u32,
    pub data: Vec<u8>,
    /// Covered by the single `PT_LOAD` segment.
    pub loaded: bool,
}

impl Section {
    pub fn progbits(name: &'static str, align: u32, data: Vec<u8>) -> Self {
        Self {
            name,
            sh_type: SHT_PROGBITS,
            align,
            data,
            loaded: false,
        }
    }

    pub fn loaded(mut self) -> Self {
        self.loaded = true;
        self
    }
}

/// Build a little-endian ELF32 executable.
///
/// Sections are laid out in order after the ELF header and one program
/// header, each at its alignment, followed by `.shstrtab` and the section
/// header table. The `PT_LOAD` segment covers the file from offset 0 through
/// the last section marked `loaded`.
pub fn build_elf(sections: &[Section]) -> Vec<u8> {
    let mut buf = vec![0u8; 52 + 32];
    buf[..4].copy_from_slice(b"\x7fELF");
    buf[4] = 1; // ELFCLASS32
    buf[5] = 1; // ELFDATA2LSB
    buf[6] = 1; // EV_CURRENT
    put_u16(&mut buf, 16, 2); // ET_EXEC
    put_u16(&mut buf, 18, 3); // EM_386
    put_u32(&mut buf, 20, 1);
    put_u32(&mut buf, 24, TEXT_ADDR);
    put_u32(&mut buf, 28, 52); // e_phoff
    put_u16(&mut buf, 40, 52); // e_ehsize
    put_u16(&mut buf, 42, 32); // e_phentsize
    put_u16(&mut buf, 44, 1); // e_phnum
    put_u16(&mut buf, 46, 40); // e_shentsize

    let mut shstrtab = vec![0u8];
    let mut headers = vec![[0u32; 10]];
    let mut load_end = buf.len();
    for section in sections {
        let name = len_u32(&shstrtab);
        shstrtab.extend_from_slice(section.name.as_bytes());
        shstrtab.push(0);

        buf.resize(buf.len().next_multiple_of(section.align.max(1) as usize), 0);
        let offset = len_u32(&buf);
        if section.sh_type != SHT_NOBITS {
            buf.extend_from_slice(&section.data);
        }
        if section.loaded {
            load_end = buf.len();
        }
        let size = len_u32(&section.data);
        headers.push([name, section.sh_type, 0, 0, offset, size, 0, 0, section.align, 0]);
    }

    let name = len_u32(&shstrtab);
    shstrtab.extend_from_slice(b".shstrtab\0");
    let offset = len_u32(&buf);
    buf.extend_from_slice(&shstrtab);
    headers.push([name, SHT_STRTAB, 0, 0, offset, len_u32(&shstrtab), 0, 0, 1, 0]);

    buf.resize(buf.len().next_multiple_of(4), 0);
    let shoff = len_u32(&buf);
    put_u32(&mut buf, 32, shoff);
    put_u16(&mut buf, 48, u16::try_from(headers.len()).unwrap());
    put_u16(&mut buf, 50, u16::try_from(headers.len() - 1).unwrap());
    for header in headers {
        for field in header {
            buf.extend_from_slice(&field.to_le_bytes());
        }
    }

    // PT_LOAD, R+X
    let load_end = u32::try_from(load_end).unwrap();
    let phdr = [1, 0, TEXT_ADDR, TEXT_ADDR, load_end, load_end, 5, 0x1000];
    for (i, field) in phdr.into_iter().enumerate() {
        put_u32(&mut buf, 52 + i * 4, field);
    }
    buf
}

pub fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn len_u32(bytes: &[u8]) -> u32 {
    u32::try_from(bytes.len()).unwrap()
}

/// Abbreviation table with one compile unit entry:
/// producer (string), name (strp), stmt_list (sec_offset), low_pc (addr).
pub fn abbrev_table() -> Vec<u8> {
    vec![
        1, 0x11, 0, // code 1, DW_TAG_compile_unit, no children
        0x25, 0x08, // DW_AT_producer, string
        0x03, 0x0e, // DW_AT_name, strp
        0x10, 0x17, // DW_AT_stmt_list, sec_offset
        0x11, 0x01, // DW_AT_low_pc, addr
        0, 0, //
        0,
    ]
}

/// A version 4 compile unit pointing at `stmt_list`.
pub fn compile_unit(stmt_list: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&4u16.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes()); // debug_abbrev_offset
    body.push(4); // address_size
    body.push(1);
    body.extend_from_slice(b"lineslim-test\0");
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&stmt_list.to_le_bytes());
    body.extend_from_slice(&TEXT_ADDR.to_le_bytes());

    let mut cu = len_u32(&body).to_le_bytes().to_vec();
    cu.extend_from_slice(&body);
    cu
}

/// A line program unit with `min_inst = 1`, `default_is_stmt = 1`,
/// `line_base = -5`, `line_range = 14`, `opcode_base = 13`, directory
/// "src" and files "main.c" (dir 1) and "util.h".
pub fn line_program(version: u16, bytecode: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    buf.extend_from_slice(&version.to_le_bytes());
    buf.extend_from_slice(&[0u8; 4]);
    let header_start = buf.len();

    buf.push(1);
    if version >= 4 {
        buf.push(1);
    }
    buf.extend_from_slice(&[1, 0xfb, 14, 13]);
    buf.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]);
    buf.extend_from_slice(b"src\0\0");
    buf.extend_from_slice(b"main.c\0\x01\0\0");
    buf.extend_from_slice(b"util.h\0\0\0\0");
    buf.push(0);

    let header_length = len_u32(&buf[header_start..]);
    put_u32(&mut buf, 6, header_length);
    buf.extend_from_slice(bytecode);
    let unit_length = len_u32(&buf[4..]);
    put_u32(&mut buf, 0, unit_length);
    buf
}

/// Two sequences: five rows (one of them at a duplicate address) and
/// two rows, each closed by `end_sequence`.
pub fn scenario_bytecode() -> Vec<u8> {
    let mut code = Vec::new();
    set_address(&mut code, TEXT_ADDR);
    code.push(0x01); // copy: 0x0, line 1
    code.push(47); // +2, line +1: 0x2, line 2
    code.push(19); // +0, line +1: 0x2, line 3
    code.push(62); // +3, line +2: 0x5, line 5
    code.push(75); // +4, line +1: 0x9, line 6
    code.extend_from_slice(&[0x02, 3]); // advance_pc 3
    code.extend_from_slice(&[0x00, 1, 0x01]); // end_sequence at 0xc

    set_address(&mut code, TEXT_ADDR + 0x100);
    code.push(0x01); // copy: 0x100, line 1
    code.push(77); // +4, line +3: 0x104, line 4
    code.extend_from_slice(&[0x02, 2]); // advance_pc 2
    code.extend_from_slice(&[0x00, 1, 0x01]); // end_sequence at 0x106
    code
}

fn set_address(code: &mut Vec<u8>, address: u32) {
    code.extend_from_slice(&[0x00, 5, 0x02]);
    code.extend_from_slice(&address.to_le_bytes());
}

/// Build the end-to-end fixture.
///
/// `.debug_line` starts with an unreferenced line program so the
/// referenced one sits at a nonzero offset. All `cu_count` compile units
/// point at the referenced program.
pub fn scenario_elf(version: u16, cu_count: usize) -> Vec<u8> {
    let orphan = line_program(3, &[0x00, 1, 0x01]);
    let stmt_list = len_u32(&orphan);
    let mut debug_line = orphan;
    debug_line.extend_from_slice(&line_program(version, &scenario_bytecode()));

    let mut debug_info = Vec::new();
    for _ in 0..cu_count {
        debug_info.extend_from_slice(&compile_unit(stmt_list));
    }

    build_elf(&[
        Section::progbits(".text", 16, vec![0x90; 0x40]).loaded(),
        Section::progbits(".debug_info", 1, debug_info),
        Section::progbits(".debug_abbrev", 1, abbrev_table()),
        Section::progbits(".debug_line", 1, debug_line),
        Section::progbits(".comment", 1, b"GCC: (GNU) 13.2.0\0".to_vec()),
    ])
}
