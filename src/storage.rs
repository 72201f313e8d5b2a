// ---------------------------------------------------------------------------
// StorageIndex -- a leaf index backed by an external key/value store
// ---------------------------------------------------------------------------
//
// Grounded on pysimsearch's ShelfSimIndex: the same postings/df/doclen model
// as the memory leaf, but every map lives behind a `KvStore` that only
// supports whole-value get/put, never in-place mutation or iteration. Every
// write therefore reads the current value, mutates a local copy, and puts
// the whole thing back -- the "full reassignment" contract named in the
// spec. `close()` flushes and is required before the store can be dropped
// safely.
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::config::IndexConfig;
use crate::error::{EngineError, Result};
use crate::scorer::{self, Corpus, Scorer};
use crate::sim_index::{ScorerArg, SimIndex};
use crate::term_vec::{self, TermVec};
use crate::vector_math::l2_norm;

/// A key/value store that only supports whole-value get/put. No in-place
/// mutation, no iteration -- exactly the shelf/dbm contract the reference
/// storage-backed index is built on.
pub trait KvStore: Send {
	fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;
	fn put_bytes(&mut self, key: &str, value: &[u8]) -> Result<()>;
	fn delete(&mut self, key: &str) -> Result<()>;
	fn close(&mut self) -> Result<()>;
}

fn get_json<S: KvStore + ?Sized, T: DeserializeOwned>(store: &S, key: &str) -> Result<Option<T>> {
	match store.get_bytes(key)? {
		Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
		None => Ok(None),
	}
}

fn put_json<S: KvStore + ?Sized, T: Serialize>(store: &mut S, key: &str, value: &T) -> Result<()> {
	let bytes = serde_json::to_vec(value)?;
	store.put_bytes(key, &bytes)
}

/// An in-memory `KvStore`, for tests and for composing a real backend later
/// without needing one on hand yet.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
	map: HashMap<String, Vec<u8>>,
	closed: bool,
}

impl KvStore for InMemoryKvStore {
	fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
		if self.closed {
			return Err(EngineError::InPlaceMutationUnsupported("store is closed".to_string()));
		}
		Ok(self.map.get(key).cloned())
	}

	fn put_bytes(&mut self, key: &str, value: &[u8]) -> Result<()> {
		if self.closed {
			return Err(EngineError::InPlaceMutationUnsupported("store is closed".to_string()));
		}
		self.map.insert(key.to_string(), value.to_vec());
		Ok(())
	}

	fn delete(&mut self, key: &str) -> Result<()> {
		self.map.remove(key);
		Ok(())
	}

	fn close(&mut self) -> Result<()> {
		self.closed = true;
		Ok(())
	}
}

const KEY_NAME_TO_DOCID: &str = "name_to_docid";
const KEY_DOCID_TO_NAME: &str = "docid_to_name";
const KEY_POSTINGS: &str = "postings";
const KEY_VECTORS: &str = "vectors";
const KEY_DF: &str = "df";
const KEY_DOCLEN: &str = "doclen";
const KEY_N: &str = "n";
const KEY_NEXT_DOCID: &str = "next_docid";
const KEY_CONFIG_LOWERCASE: &str = "config_lowercase";
const KEY_CONFIG_STOPLIST: &str = "config_stoplist";

/// Storage-backed leaf index. Same semantics as [`crate::index::MemoryIndex`]
/// but every access round-trips through a [`KvStore`].
pub struct StorageIndex<S: KvStore> {
	store: S,
	scorer: Box<dyn Scorer>,
	global_n: Option<u64>,
	global_df: Option<HashMap<String, u64>>,
}

impl<S: KvStore> StorageIndex<S> {
	pub fn open(store: S) -> Self {
		Self {
			store,
			scorer: scorer::make_scorer("tfidf").expect("tfidf is always registered"),
			global_n: None,
			global_df: None,
		}
	}

	pub fn close(&mut self) -> Result<()> {
		self.store.close()
	}

	fn name_to_docid_map(&self) -> Result<HashMap<String, u64>> {
		Ok(get_json(&self.store, KEY_NAME_TO_DOCID)?.unwrap_or_default())
	}

	fn docid_to_name_map(&self) -> Result<HashMap<u64, String>> {
		Ok(get_json(&self.store, KEY_DOCID_TO_NAME)?.unwrap_or_default())
	}

	fn postings_map(&self) -> Result<HashMap<String, Vec<(u64, u32)>>> {
		Ok(get_json(&self.store, KEY_POSTINGS)?.unwrap_or_default())
	}

	fn vectors_map(&self) -> Result<HashMap<u64, TermVec>> {
		Ok(get_json(&self.store, KEY_VECTORS)?.unwrap_or_default())
	}

	fn df_map(&self) -> Result<HashMap<String, u64>> {
		Ok(get_json(&self.store, KEY_DF)?.unwrap_or_default())
	}

	fn doclen_map(&self) -> Result<HashMap<u64, f64>> {
		Ok(get_json(&self.store, KEY_DOCLEN)?.unwrap_or_default())
	}

	/// `N` at open time is derived from the size of the docid->name store
	/// whenever no `KEY_N` counter has been written yet, so opening over a
	/// store populated out-of-band still reports the true document count.
	fn n_value(&self) -> Result<u64> {
		match get_json(&self.store, KEY_N)? {
			Some(n) => Ok(n),
			None => Ok(self.docid_to_name_map()?.len() as u64),
		}
	}

	fn next_docid_value(&self) -> Result<u64> {
		Ok(get_json(&self.store, KEY_NEXT_DOCID)?.unwrap_or(0))
	}

	fn index_config(&self) -> Result<IndexConfig> {
		let lowercase: bool = get_json(&self.store, KEY_CONFIG_LOWERCASE)?.unwrap_or(true);
		let stoplist: Vec<String> = get_json(&self.store, KEY_CONFIG_STOPLIST)?.unwrap_or_default();
		Ok(IndexConfig {
			lowercase,
			stoplist: stoplist.into_iter().collect(),
		})
	}
}

impl<S: KvStore> Corpus for StorageIndex<S> {
	fn n(&self) -> u64 {
		self.global_n.unwrap_or_else(|| self.n_value().unwrap_or(0))
	}

	fn df(&self, term: &str) -> u64 {
		let local;
		let map = match &self.global_df {
			Some(g) => g,
			None => {
				local = self.df_map().unwrap_or_default();
				&local
			}
		};
		*map.get(term).unwrap_or(&1)
	}

	fn doclen(&self, docid: &str) -> f64 {
		let id: u64 = match docid.parse() {
			Ok(id) => id,
			Err(_) => return 0.0,
		};
		self.doclen_map().ok().and_then(|m| m.get(&id).copied()).unwrap_or(0.0)
	}
}

impl<S: KvStore> SimIndex for StorageIndex<S> {
	fn index_string_buffers(&mut self, items: Vec<(String, String)>) -> Result<()> {
		let cfg = self.index_config()?;
		let tvc = cfg.term_vec_config();

		let mut name_to_docid = self.name_to_docid_map()?;
		let mut docid_to_name = self.docid_to_name_map()?;
		let mut postings = self.postings_map()?;
		let mut vectors = self.vectors_map()?;
		let mut df = self.df_map()?;
		let mut doclen = self.doclen_map()?;
		let mut n = self.n_value()?;
		let mut next_docid = self.next_docid_value()?;

		for (name, buffer) in items {
			let tv = term_vec::term_vec_from_str(&buffer, &tvc);
			let docid = next_docid;
			next_docid += 1;
			for (term, freq) in &tv {
				*df.entry(term.clone()).or_insert(0) += 1;
				postings.entry(term.clone()).or_default().push((docid, *freq));
			}
			doclen.insert(docid, l2_norm(&tv));
			vectors.insert(docid, tv);
			name_to_docid.insert(name.clone(), docid);
			docid_to_name.insert(docid, name);
			n += 1;
		}

		put_json(&mut self.store, KEY_NAME_TO_DOCID, &name_to_docid)?;
		put_json(&mut self.store, KEY_DOCID_TO_NAME, &docid_to_name)?;
		put_json(&mut self.store, KEY_POSTINGS, &postings)?;
		put_json(&mut self.store, KEY_VECTORS, &vectors)?;
		put_json(&mut self.store, KEY_DF, &df)?;
		put_json(&mut self.store, KEY_DOCLEN, &doclen)?;
		put_json(&mut self.store, KEY_N, &n)?;
		put_json(&mut self.store, KEY_NEXT_DOCID, &next_docid)
	}

	fn del_docids(&mut self, docids: Vec<String>) -> Result<()> {
		let mut name_to_docid = self.name_to_docid_map()?;
		let mut docid_to_name = self.docid_to_name_map()?;
		let mut postings = self.postings_map()?;
		let mut vectors = self.vectors_map()?;
		let mut df = self.df_map()?;
		let mut doclen = self.doclen_map()?;
		let mut n = self.n_value()?;

		for docid_str in docids {
			let docid = match docid_str.parse::<u64>() {
				Ok(id) => id,
				Err(_) => continue,
			};
			let tv = match vectors.remove(&docid) {
				Some(tv) => tv,
				None => continue,
			};
			for (term, _freq) in &tv {
				if let Some(count) = df.get_mut(term) {
					*count = count.saturating_sub(1);
					if *count == 0 {
						df.remove(term);
					}
				}
				if let Some(list) = postings.get_mut(term) {
					list.retain(|(d, _)| *d != docid);
					if list.is_empty() {
						postings.remove(term);
					}
				}
			}
			if let Some(name) = docid_to_name.remove(&docid) {
				name_to_docid.remove(&name);
			}
			doclen.remove(&docid);
			n = n.saturating_sub(1);
		}

		put_json(&mut self.store, KEY_NAME_TO_DOCID, &name_to_docid)?;
		put_json(&mut self.store, KEY_DOCID_TO_NAME, &docid_to_name)?;
		put_json(&mut self.store, KEY_POSTINGS, &postings)?;
		put_json(&mut self.store, KEY_VECTORS, &vectors)?;
		put_json(&mut self.store, KEY_DF, &df)?;
		put_json(&mut self.store, KEY_DOCLEN, &doclen)?;
		put_json(&mut self.store, KEY_N, &n)
	}

	fn docid_to_name(&self, docid: &str) -> Result<String> {
		let id: u64 = docid.parse().map_err(|_| EngineError::UnknownDocid(docid.to_string()))?;
		self.docid_to_name_map()?
			.get(&id)
			.cloned()
			.ok_or_else(|| EngineError::UnknownDocid(docid.to_string()))
	}

	fn name_to_docid(&self, name: &str) -> Result<String> {
		self.name_to_docid_map()?
			.get(name)
			.map(|id| id.to_string())
			.ok_or_else(|| EngineError::UnknownName(name.to_string()))
	}

	fn postings_list(&self, term: &str) -> Vec<(String, u32)> {
		let cfg = match self.index_config() {
			Ok(c) => c,
			Err(_) => return Vec::new(),
		};
		let canon = if cfg.lowercase { term.to_lowercase() } else { term.to_string() };
		self.postings_map()
			.ok()
			.and_then(|m| m.get(&canon).cloned())
			.map(|list| list.into_iter().map(|(d, f)| (d.to_string(), f)).collect())
			.unwrap_or_default()
	}

	fn query(&self, q: &str) -> Vec<(String, f64)> {
		let cfg = match self.index_config() {
			Ok(c) => c,
			Err(_) => return Vec::new(),
		};
		let tv = term_vec::term_vec_from_str(q, &cfg.term_vec_config());
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
		self.index_config()?.get(key)
	}

	fn set_config(&mut self, key: &str, value: Value) -> Result<()> {
		let mut cfg = self.index_config()?;
		cfg.set(key, value)?;
		put_json(&mut self.store, KEY_CONFIG_LOWERCASE, &cfg.lowercase)?;
		let stoplist: Vec<String> = cfg.stoplist.into_iter().collect();
		put_json(&mut self.store, KEY_CONFIG_STOPLIST, &stoplist)
	}

	fn set_query_scorer(&mut self, scorer: ScorerArg) -> Result<()> {
		self.scorer = match scorer {
			ScorerArg::Name(name) => scorer::make_scorer(&name)?,
			ScorerArg::Instance(s) => s,
		};
		Ok(())
	}

	fn get_local_n(&self) -> u64 {
		self.n_value().unwrap_or(0)
	}

	fn get_local_df_map(&self) -> HashMap<String, u64> {
		self.df_map().unwrap_or_default()
	}

	fn get_name_to_docid_map(&self) -> HashMap<String, String> {
		self.name_to_docid_map()
			.unwrap_or_default()
			.into_iter()
			.map(|(n, d)| (n, d.to_string()))
			.collect()
	}

	fn set_global_n(&mut self, n: Option<u64>) {
		self.global_n = n;
	}

	fn set_global_df_map(&mut self, df_map: Option<HashMap<String, u64>>) {
		self.global_df = df_map;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fresh() -> StorageIndex<InMemoryKvStore> {
		StorageIndex::open(InMemoryKvStore::default())
	}

	#[test]
	fn round_trips_through_get_put_only() {
		let mut idx = fresh();
		idx.index_string_buffers(vec![
			("doc1".to_string(), "hello world".to_string()),
			("doc2".to_string(), "hello there".to_string()),
		])
		.unwrap();

		let mut hello = idx.postings_list("hello");
		hello.sort();
		assert_eq!(hello.len(), 2);
		assert_eq!(idx.get_local_n(), 2);
	}

	#[test]
	fn delete_reassigns_whole_maps() {
		let mut idx = fresh();
		idx.index_string_buffers(vec![("doc1".to_string(), "hello world".to_string())])
			.unwrap();
		let id = idx.name_to_docid("doc1").unwrap();
		idx.del_docids(vec![id]).unwrap();
		assert_eq!(idx.get_local_n(), 0);
		assert!(idx.postings_list("hello").is_empty());
	}

	#[test]
	fn close_then_access_errors() {
		let mut idx = fresh();
		idx.index_string_buffers(vec![("doc1".to_string(), "hello".to_string())])
			.unwrap();
		idx.close().unwrap();
		assert!(idx.index_string_buffers(vec![("doc2".to_string(), "x".to_string())]).is_err());
	}

	#[test]
	fn matches_memory_index_on_simple_count() {
		let mut idx = fresh();
		idx.set_query_scorer(ScorerArg::Name("simple_count".to_string())).unwrap();
		idx.index_string_buffers(vec![
			("doc1".to_string(), "hello world hello".to_string()),
			("doc2".to_string(), "hello world".to_string()),
		])
		.unwrap();
		let hits: HashMap<String, f64> = idx.query("hello world").into_iter().collect();
		assert_eq!(hits.get("doc1"), Some(&3.0));
		assert_eq!(hits.get("doc2"), Some(&2.0));
	}
}
