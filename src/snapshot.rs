// ---------------------------------------------------------------------------
// Snapshot persistence -- gzip-compressed JSON save/load
// ---------------------------------------------------------------------------
//
// Serialise to JSON, gzip the bytes, write to disk (or read back, ungzip,
// deserialise). No custom binary packing is needed here -- unlike float
// embedding vectors, term frequencies and docids serialise fine as JSON
// numbers, so there's no base64 layer to add; the gzip stream is written
// directly.
// ---------------------------------------------------------------------------

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::Result;
use crate::index::{IndexSnapshot, MemoryIndex};

/// Magic prefix written before the gzip stream, so `load` can fail fast on
/// a file that isn't one of ours instead of producing a confusing gzip
/// error.
const MAGIC: &[u8] = b"SIMIDX01";

pub fn save(index: &MemoryIndex, path: &Path) -> Result<()> {
	let snapshot = index.snapshot();
	let json = serde_json::to_vec(&snapshot)?;

	let file = File::create(path)?;
	let mut writer = BufWriter::new(file);
	writer.write_all(MAGIC)?;
	let mut encoder = GzEncoder::new(&mut writer, Compression::default());
	encoder.write_all(&json)?;
	encoder.finish()?;
	Ok(())
}

pub fn load(path: &Path) -> Result<MemoryIndex> {
	let file = File::open(path)?;
	let mut reader = BufReader::new(file);

	let mut magic = [0u8; 8];
	reader.read_exact(&mut magic)?;
	if magic != MAGIC {
		return Err(crate::error::EngineError::Corruption(
			"missing snapshot magic header".to_string(),
		));
	}

	let mut decoder = GzDecoder::new(reader);
	let mut json = Vec::new();
	decoder.read_to_end(&mut json)?;

	let snapshot: IndexSnapshot = serde_json::from_slice(&json)?;
	Ok(MemoryIndex::from_snapshot(snapshot))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sim_index::SimIndex;

	#[test]
	fn round_trips_index_state() {
		let mut idx = MemoryIndex::new();
		idx.index_string_buffers(vec![
			("doc1".to_string(), "hello world".to_string()),
			("doc2".to_string(), "hello there".to_string()),
		])
		.unwrap();

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("snap.gz");
		save(&idx, &path).unwrap();

		let loaded = load(&path).unwrap();
		assert_eq!(loaded.get_local_n(), 2);
		assert_eq!(
			loaded.get_name_to_docid_map().len(),
			idx.get_name_to_docid_map().len()
		);
		let mut hello = loaded.postings_list("hello");
		hello.sort();
		assert_eq!(hello.len(), 2);
	}

	#[test]
	fn load_rejects_non_snapshot_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("junk.gz");
		std::fs::write(&path, b"not a snapshot").unwrap();
		assert!(load(&path).is_err());
	}
}
