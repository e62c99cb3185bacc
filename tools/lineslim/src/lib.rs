//! Shrinks the DWARF line-number tables of ELF32 binaries.
//!
//! Every line program referenced from `.debug_info` is decoded, stripped of
//! redundant rows and re-encoded with the shortest opcodes available. The
//! new `.debug_line` section is spliced into a relocated copy of the file
//! with the `DW_AT_stmt_list` pointers and section headers patched to match.
//! Loadable segments keep their exact file layout.
//!
//! Pipeline: copy fixed region → copy `.debug_info` → rewrite each line
//! program → copy remaining sections → write section headers → replace file.

pub mod dump;
pub mod logging;
pub mod rewrite;

pub use dump::dump_image;
pub use rewrite::{RewriteOptions, RewriteStats, rewrite_file, rewrite_image};
