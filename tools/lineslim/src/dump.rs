//! Line table listing for `--dump`.

use std::collections::HashSet;
use std::io::Write;

use anyhow::{Context, Result};
use lineslim_dwarf::{LineRow, StmtLists, decode, line_unit};
use lineslim_elf::ElfContainer;

use crate::rewrite::debug_sections;

/// Writes the decoded line table of every line program in `.debug_line` to
/// `out`, in section order.
///
/// Programs that no compile unit in `.debug_info` points at are still listed
/// and marked `unreferenced`.
///
/// # Errors
///
/// Fails if the image cannot be parsed, `.debug_info` cannot be walked, a
/// line program cannot be decoded, or writing to `out` fails.
pub fn dump_image(data: &[u8], out: &mut impl Write) -> Result<()> {
    let elf = ElfContainer::open(data).context("failed to parse ELF32 file")?;
    let sections = debug_sections(&elf)?;
    let info = elf.section_data(sections.info.index)?;
    let abbrev = elf.section_data(sections.abbrev.index)?;
    let line = elf.section_data(sections.line.index)?;

    let referenced = StmtLists::new(info, abbrev)
        .map(|stmt| stmt.map(|stmt| stmt.line_offset))
        .collect::<Result<HashSet<_>, _>>()
        .context("failed to walk .debug_info")?;

    let mut offset = 0;
    while (offset as usize) < line.len() {
        let unit = line_unit(line, offset)?;
        let program = decode(unit)
            .with_context(|| format!("failed to decode line program at {offset:#x}"))?;

        write!(
            out,
            "line program at {offset:#x} (version {}, {} files, {} rows)",
            program.header.version,
            program.files.len(),
            program.rows.len()
        )?;
        if referenced.contains(&offset) {
            writeln!(out)?;
        } else {
            writeln!(out, " unreferenced")?;
        }
        for (index, file) in program.files.iter().enumerate() {
            writeln!(out, "  file {:>3}: {}", index + 1, file.path.display())?;
        }
        writeln!(
            out,
            "  {:<10} {:>6} {:>4} {:>4} {:>4} {:>5} {:>3}",
            "addr", "line", "file", "stmt", "col", "discr", "end"
        )?;
        for row in &program.rows {
            write_row(out, row)?;
        }

        offset = u32::try_from(unit.len())
            .ok()
            .and_then(|len| offset.checked_add(len))
            .context(".debug_line offset overflows")?;
    }
    Ok(())
}

fn write_row(out: &mut impl Write, row: &LineRow) -> Result<()> {
    writeln!(
        out,
        "  {:#010x} {:>6} {:>4} {:>4} {:>4} {:>5} {:>3}",
        row.address,
        row.line,
        row.file,
        flag(row.is_stmt),
        row.column,
        row.discriminator,
        flag(row.end_sequence)
    )?;
    Ok(())
}

fn flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
