// ---------------------------------------------------------------------------
// Document-frequency file tools
// ---------------------------------------------------------------------------
//
// Grounded on pysimsearch's freq_tools.py: read a batch of documents, build
// a throwaway in-memory index just to get df counts out of it, then write
// `<term> <df>` lines. One entry per distinct term, blank lines in the
// output are never produced; on the read side, blank lines are skipped and
// a malformed line names itself in the error.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::index::MemoryIndex;
use crate::sim_index::SimIndex;

/// Build document-frequency counts by indexing each named file, then
/// reading back the resulting leaf's df map.
pub fn compute_df(named_paths: Vec<(String, std::path::PathBuf)>) -> Result<HashMap<String, u64>> {
	let mut idx = MemoryIndex::new();
	idx.index_files(named_paths)?;
	Ok(idx.get_local_df_map())
}

/// Write a df map as `<term> <df>` lines, sorted by term for a stable diff.
pub fn write_df_file<W: Write>(mut out: W, df: &HashMap<String, u64>) -> Result<()> {
	let mut terms: Vec<&String> = df.keys().collect();
	terms.sort();
	for term in terms {
		writeln!(out, "{} {}", term, df[term])?;
	}
	Ok(())
}

/// Parse a df file: `<term> <tab or space> <integer df>` per non-blank line.
pub fn read_df_file<R: BufRead>(input: R) -> Result<HashMap<String, u64>> {
	let mut df = HashMap::new();
	for (lineno, line) in input.lines().enumerate() {
		let line = line?;
		if line.trim().is_empty() {
			continue;
		}
		let fields: Vec<&str> = line.split_whitespace().collect();
		if fields.len() != 2 {
			return Err(EngineError::Malformed(format!(
				"df file line {}: expected 2 fields, found {}",
				lineno + 1,
				fields.len()
			)));
		}
		let count: u64 = fields[1]
			.parse()
			.map_err(|_| EngineError::Malformed(format!("df file line {}: not an integer: {}", lineno + 1, fields[1])))?;
		df.insert(fields[0].to_string(), count);
	}
	Ok(df)
}

/// Read newline-separated document names from a `--list` file.
pub fn read_name_list(path: &Path) -> Result<Vec<String>> {
	let text = std::fs::read_to_string(path)?;
	Ok(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
}
