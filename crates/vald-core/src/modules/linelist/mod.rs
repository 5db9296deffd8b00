mod model;
mod parser;
pub mod rewrite;

pub use model::{LineListFile, LineListRecord, LineListWriter, Species};
pub use parser::{parse_line_list, read_line_list};
pub use rewrite::{canonical_reference_line, rewrite_record};

/// Lines per VALD long-format record.
pub const RECORD_LINE_COUNT: usize = 4;
