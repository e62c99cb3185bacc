//! Rewrite orchestrator.
//!
//! Output layout, in the order offsets are assigned:
//!
//! ```text
//! [0, fixed_end)     ELF header, program headers, loadable sections (verbatim)
//! .debug_info        copied, then patched in place
//! .debug_line        regenerated, one unit per referenced line program
//! other sections     copied in table order
//! section headers    4-byte aligned, end of file
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use lineslim_dwarf::{StmtLists, decode, line_unit, optimize};
use lineslim_elf::{ElfContainer, OutputImage, SHT_NOBITS, SectionInfo};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Name of the line-number program section.
pub const DEBUG_LINE: &str = ".debug_line";
/// Name of the debugging information entry section.
pub const DEBUG_INFO: &str = ".debug_info";
/// Name of the abbreviation table section.
pub const DEBUG_ABBREV: &str = ".debug_abbrev";

/// Settings for [`rewrite_file`].
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions {
    /// Write the result here instead of replacing the input.
    pub output: Option<PathBuf>,
}

/// Summary of one rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Distinct line programs rewritten.
    pub units: usize,
    /// Rows decoded from the input programs.
    pub rows_decoded: usize,
    /// Rows left after optimization.
    pub rows_kept: usize,
    /// Size of the input `.debug_line` section.
    pub old_line_size: u32,
    /// Size of the output `.debug_line` section.
    pub new_line_size: u32,
    /// Length of the output file.
    pub file_size: u32,
}

/// The three sections the rewrite works on.
#[derive(Debug, Clone, Copy)]
pub struct DebugSections {
    /// `.debug_info`.
    pub info: SectionInfo,
    /// `.debug_abbrev`.
    pub abbrev: SectionInfo,
    /// `.debug_line`.
    pub line: SectionInfo,
}

/// Locates `.debug_info`, `.debug_abbrev` and `.debug_line`.
///
/// # Errors
///
/// Fails if any of them is missing or has no file contents.
pub fn debug_sections(elf: &ElfContainer<'_>) -> Result<DebugSections> {
    let names = [DEBUG_INFO, DEBUG_ABBREV, DEBUG_LINE];
    let found = elf.find_sections(&names);
    let pick = |i: usize| -> Result<SectionInfo> {
        let name = names[i];
        let info = found[i].with_context(|| format!("missing {name} section"))?;
        if info.sh_type == SHT_NOBITS {
            bail!("{name} has no contents in the file");
        }
        Ok(info)
    };
    Ok(DebugSections {
        info: pick(0)?,
        abbrev: pick(1)?,
        line: pick(2)?,
    })
}

/// Rewrites an in-memory ELF32 image, returning the new image.
///
/// # Errors
///
/// Fails if the image is not a supported ELF32 file, lacks the debug
/// sections, or contains a line program or compile unit that cannot be
/// decoded or re-encoded.
pub fn rewrite_image(data: &[u8]) -> Result<(Vec<u8>, RewriteStats)> {
    let mut elf = ElfContainer::open(data).context("failed to parse ELF32 file")?;
    let sections = debug_sections(&elf)?;
    if sections.line.offset < elf.fixed_region_end() {
        bail!("{DEBUG_LINE} lies inside a loadable segment and cannot be moved");
    }

    let info_data = elf.section_data(sections.info.index)?;
    let abbrev_data = elf.section_data(sections.abbrev.index)?;
    let line_data = elf.section_data(sections.line.index)?;

    let mut out = OutputImage::with_capacity(data.len());
    let mut offset = elf.copy_fixed_sections(&mut out)?;

    // `.debug_info` goes first so the stmt_list values can be patched in the
    // output copy as each line program is placed.
    offset = elf.copy_section(&mut out, offset, sections.info.index)?;
    let info_out = elf.section(sections.info.index)?.header.sh_offset as usize;

    let line_start = offset
        .checked_next_multiple_of(sections.line.alignment)
        .context("output offset overflow")?;
    elf.mark_section_copied(sections.line.index, line_start)?;

    let mut stats = RewriteStats {
        old_line_size: sections.line.size,
        ..RewriteStats::default()
    };
    let mut line_end = line_start;
    let mut placed: HashMap<u32, u32> = HashMap::new();

    for stmt in StmtLists::new(info_data, abbrev_data) {
        let stmt = stmt.context("failed to walk .debug_info")?;
        let relative = if let Some(&relative) = placed.get(&stmt.line_offset) {
            warn!(
                line_offset = stmt.line_offset,
                unit_offset = stmt.unit_offset,
                "line program shared by several compile units"
            );
            relative
        } else {
            let unit = line_unit(line_data, stmt.line_offset).with_context(|| {
                format!(
                    "compile unit at {:#x} has a bad stmt_list",
                    stmt.unit_offset
                )
            })?;
            let program = decode(unit).with_context(|| {
                format!("failed to decode line program at {:#x}", stmt.line_offset)
            })?;
            let mut rows = program.rows.clone();
            optimize(&mut rows);
            let bytes = program.encode(&rows).with_context(|| {
                format!("failed to encode line program at {:#x}", stmt.line_offset)
            })?;

            let relative = line_end - line_start;
            out.write_at(line_end as usize, &bytes);
            line_end = u32::try_from(bytes.len())
                .ok()
                .and_then(|len| line_end.checked_add(len))
                .context("output offset overflow")?;
            debug!(
                old = stmt.line_offset,
                new = relative,
                rows = program.rows.len(),
                kept = rows.len(),
                old_size = unit.len(),
                new_size = bytes.len(),
                "rewrote line program"
            );

            stats.units += 1;
            stats.rows_decoded += program.rows.len();
            stats.rows_kept += rows.len();
            placed.insert(stmt.line_offset, relative);
            relative
        };
        out.write_u32_at(info_out + stmt.value_offset, relative);
    }

    stats.new_line_size = line_end - line_start;
    elf.set_section_size(sections.line.index, stats.new_line_size)?;

    let end = elf.copy_sections(&mut out, line_end)?;
    elf.write_program_headers(&mut out);
    stats.file_size = elf.write_section_headers(&mut out, end)?;
    Ok((out.into_inner(), stats))
}

/// Rewrites the ELF32 file at `path`.
///
/// The result replaces `path`, or goes to `options.output` when set. The
/// target is only ever replaced by a complete file.
///
/// # Errors
///
/// Fails on I/O errors and for every error of [`rewrite_image`]; the target
/// is left untouched in that case.
pub fn rewrite_file(path: &Path, options: &RewriteOptions) -> Result<RewriteStats> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let (image, stats) =
        rewrite_image(&data).with_context(|| format!("failed to rewrite {}", path.display()))?;

    let permissions = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .permissions();
    let target = options.output.as_deref().unwrap_or(path);
    persist(target, &image, permissions)?;
    Ok(stats)
}

/// Atomically replaces `target` with `bytes`.
fn persist(target: &Path, bytes: &[u8], permissions: fs::Permissions) -> Result<()> {
    let dir = match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    file.write_all(bytes)
        .context("failed to write temporary file")?;
    file.as_file()
        .sync_all()
        .context("failed to flush temporary file")?;
    fs::set_permissions(file.path(), permissions)
        .context("failed to set permissions on temporary file")?;
    file.persist(target)
        .with_context(|| format!("failed to replace {}", target.display()))?;
    Ok(())
}
