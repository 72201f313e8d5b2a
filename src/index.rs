// ---------------------------------------------------------------------------
// MemoryIndex -- the in-memory leaf inverted index
// ---------------------------------------------------------------------------
//
// Grounded on pysimsearch's MapSimIndex/MemorySimIndex (term_index,
// doc_vectors, df_map, doc_len_map, name<->docid maps) and on an ordinary
// InvertedIndex shape (postings as owned collections keyed by term,
// maintained incrementally on insert/delete). Docids are assigned as a
// monotonically increasing u64 internally but exposed as decimal strings at
// the trait boundary, matching the storage-backed variant's stringification
// contract so leaves and storage-backed leaves are interchangeable.
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::IndexConfig;
use crate::error::{EngineError, Result};
use crate::scorer::{self, Corpus, Scorer};
use crate::sim_index::{ScorerArg, SimIndex};
use crate::term_vec::{self, TermVec};
use crate::vector_math::l2_norm;

/// Serialisable snapshot of everything in [`MemoryIndex`] except the
/// scorer; callers re-attach a scorer after load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexSnapshot {
	pub name_to_docid: HashMap<String, u64>,
	pub docid_to_name: HashMap<u64, String>,
	pub postings: HashMap<String, Vec<(u64, u32)>>,
	pub vectors: HashMap<u64, TermVec>,
	pub df: HashMap<String, u64>,
	pub doclen: HashMap<u64, f64>,
	pub n: u64,
	pub next_docid: u64,
	pub lowercase: bool,
	pub stoplist: Vec<String>,
}

/// The in-memory leaf index.
pub struct MemoryIndex {
	name_to_docid: HashMap<String, u64>,
	docid_to_name: HashMap<u64, String>,
	/// term -> ordered postings list (insertion order at this leaf).
	postings: HashMap<String, Vec<(u64, u32)>>,
	/// docid -> term vector, needed to support deletions.
	vectors: HashMap<u64, TermVec>,
	df: HashMap<String, u64>,
	doclen: HashMap<u64, f64>,
	n: u64,
	next_docid: u64,
	config: IndexConfig,
	global_n: Option<u64>,
	global_df: Option<HashMap<String, u64>>,
	scorer: Box<dyn Scorer>,
}

impl Default for MemoryIndex {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryIndex {
	pub fn new() -> Self {
		Self {
			name_to_docid: HashMap::new(),
			docid_to_name: HashMap::new(),
			postings: HashMap::new(),
			vectors: HashMap::new(),
			df: HashMap::new(),
			doclen: HashMap::new(),
			n: 0,
			next_docid: 0,
			config: IndexConfig::default(),
			global_n: None,
			global_df: None,
			scorer: scorer::make_scorer("tfidf").expect("tfidf is always registered"),
		}
	}

	fn canonical_term(&self, term: &str) -> String {
		if self.config.lowercase {
			term.to_lowercase()
		} else {
			term.to_string()
		}
	}

	fn parse_docid(&self, docid: &str) -> Result<u64> {
		docid
			.parse::<u64>()
			.map_err(|_| EngineError::UnknownDocid(docid.to_string()))
	}

	/// Insert one (name, term-vector) pair. Caller guarantees `name` is
	/// fresh.
	fn insert_one(&mut self, name: String, tv: TermVec) {
		let docid = self.next_docid;
		self.next_docid += 1;

		for (term, freq) in &tv {
			*self.df.entry(term.clone()).or_insert(0) += 1;
			self.postings.entry(term.clone()).or_default().push((docid, *freq));
		}
		self.doclen.insert(docid, l2_norm(&tv));
		self.vectors.insert(docid, tv);
		self.name_to_docid.insert(name.clone(), docid);
		self.docid_to_name.insert(docid, name);
		self.n += 1;
	}

	/// Serialise the whole index state except the scorer.
	pub fn snapshot(&self) -> IndexSnapshot {
		IndexSnapshot {
			name_to_docid: self.name_to_docid.clone(),
			docid_to_name: self.docid_to_name.clone(),
			postings: self.postings.clone(),
			vectors: self.vectors.clone(),
			df: self.df.clone(),
			doclen: self.doclen.clone(),
			n: self.n,
			next_docid: self.next_docid,
			lowercase: self.config.lowercase,
			stoplist: self.config.stoplist.iter().cloned().collect(),
		}
	}

	/// Restore state from a snapshot. The scorer is reset to the default
	/// (`tfidf`); callers re-attach a scorer after load.
	pub fn from_snapshot(snap: IndexSnapshot) -> Self {
		Self {
			name_to_docid: snap.name_to_docid,
			docid_to_name: snap.docid_to_name,
			postings: snap.postings,
			vectors: snap.vectors,
			df: snap.df,
			doclen: snap.doclen,
			n: snap.n,
			next_docid: snap.next_docid,
			config: IndexConfig {
				lowercase: snap.lowercase,
				stoplist: snap.stoplist.into_iter().collect(),
			},
			global_n: None,
			global_df: None,
			scorer: scorer::make_scorer("tfidf").expect("tfidf is always registered"),
		}
	}
}

impl Corpus for MemoryIndex {
	fn n(&self) -> u64 {
		self.global_n.unwrap_or(self.n)
	}

	fn df(&self, term: &str) -> u64 {
		let map = self.global_df.as_ref().unwrap_or(&self.df);
		*map.get(term).unwrap_or(&1)
	}

	fn doclen(&self, docid: &str) -> f64 {
		match docid.parse::<u64>() {
			Ok(id) => *self.doclen.get(&id).unwrap_or(&0.0),
			Err(_) => 0.0,
		}
	}
}

impl SimIndex for MemoryIndex {
	fn index_string_buffers(&mut self, items: Vec<(String, String)>) -> Result<()> {
		let tvc = self.config.term_vec_config();
		for (name, buffer) in items {
			let tv = term_vec::term_vec_from_str(&buffer, &tvc);
			self.insert_one(name, tv);
		}
		Ok(())
	}

	fn del_docids(&mut self, docids: Vec<String>) -> Result<()> {
		for docid_str in docids {
			let docid = match docid_str.parse::<u64>() {
				Ok(id) => id,
				Err(_) => continue, // unknown ids tolerated silently
			};
			let tv = match self.vectors.remove(&docid) {
				Some(tv) => tv,
				None => continue,
			};
			for (term, _freq) in &tv {
				if let Some(df) = self.df.get_mut(term) {
					*df = df.saturating_sub(1);
					if *df == 0 {
						self.df.remove(term);
					}
				}
				if let Some(list) = self.postings.get_mut(term) {
					list.retain(|(d, _)| *d != docid);
					if list.is_empty() {
						self.postings.remove(term);
					}
				}
			}
			if let Some(name) = self.docid_to_name.remove(&docid) {
				self.name_to_docid.remove(&name);
			}
			self.doclen.remove(&docid);
			self.n = self.n.saturating_sub(1);
		}
		Ok(())
	}

	fn docid_to_name(&self, docid: &str) -> Result<String> {
		let id = self.parse_docid(docid)?;
		self.docid_to_name
			.get(&id)
			.cloned()
			.ok_or_else(|| EngineError::UnknownDocid(docid.to_string()))
	}

	fn name_to_docid(&self, name: &str) -> Result<String> {
		self.name_to_docid
			.get(name)
			.map(|id| id.to_string())
			.ok_or_else(|| EngineError::UnknownName(name.to_string()))
	}

	fn postings_list(&self, term: &str) -> Vec<(String, u32)> {
		let canon = self.canonical_term(term);
		self.postings
			.get(&canon)
			.map(|list| list.iter().map(|(d, f)| (d.to_string(), *f)).collect())
			.unwrap_or_default()
	}

	fn query(&self, q: &str) -> Vec<(String, f64)> {
		let tvc = self.config.term_vec_config();
		let tv = term_vec::term_vec_from_str(q, &tvc);
		self.query_vec(&tv)
	}

	fn query_vec(&self, q: &TermVec) -> Vec<(String, f64)> {
		let postings_lists: Vec<(String, Vec<(String, u32)>)> =
			q.keys().map(|term| (term.clone(), self.postings_list(term))).collect();
		let hits = self.scorer.score(q, &postings_lists, self);
		hits.into_iter()
			.filter_map(|(docid, score)| self.docid_to_name(&docid).ok().map(|name| (name, score)))
			.collect()
	}

	fn config(&self, key: &str) -> Result<Value> {
		self.config.get(key)
	}

	fn set_config(&mut self, key: &str, value: Value) -> Result<()> {
		self.config.set(key, value)
	}

	fn set_query_scorer(&mut self, scorer: ScorerArg) -> Result<()> {
		self.scorer = match scorer {
			ScorerArg::Name(name) => scorer::make_scorer(&name)?,
			ScorerArg::Instance(s) => s,
		};
		Ok(())
	}

	fn get_local_n(&self) -> u64 {
		self.n
	}

	fn get_local_df_map(&self) -> HashMap<String, u64> {
		self.df.clone()
	}

	fn get_name_to_docid_map(&self) -> HashMap<String, String> {
		self.name_to_docid.iter().map(|(n, d)| (n.clone(), d.to_string())).collect()
	}

	fn set_global_n(&mut self, n: Option<u64>) {
		self.global_n = n;
	}

	fn set_global_df_map(&mut self, df_map: Option<HashMap<String, u64>>) {
		self.global_df = df_map;
	}
}
