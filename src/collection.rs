// ---------------------------------------------------------------------------
// Collection -- a sharded aggregate of SimIndex nodes
// ---------------------------------------------------------------------------
//
// Grounded on pysimsearch's SimIndexCollection: documents are routed to a
// shard by a salted hash of the document name, docids crossing the
// collection boundary become compound "<shard>-<docid>" strings, and global
// N / document-frequency stats are reconciled across shards on demand
// (`update_trigger`) rather than kept eagerly in sync. Reconciliation is
// re-entrant: a nested call while one is already in flight is a no-op,
// matching the original's depth counter.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::fetch::UrlFetcher;
use crate::sim_index::{ScorerArg, SimIndex};
use crate::term_vec::TermVec;

/// Build a compound node-docid from a shard index and that shard's local
/// docid.
pub fn make_node_docid(shard: usize, local_docid: &str) -> String {
	format!("{shard}-{local_docid}")
}

/// Split a compound node-docid back into `(shard, local_docid)`.
pub fn split_node_docid(node_docid: &str) -> Result<(usize, &str)> {
	let (shard_str, local) = node_docid
		.split_once('-')
		.ok_or_else(|| EngineError::UnknownDocid(node_docid.to_string()))?;
	let shard = shard_str
		.parse::<usize>()
		.map_err(|_| EngineError::UnknownDocid(node_docid.to_string()))?;
	Ok((shard, local))
}

/// Deterministic within one collection instance, not across instances --
/// mirrors the reference's per-instance salt, which exists so identically
/// named documents don't all land on the same shard across independently
/// constructed collections.
fn default_shard_func(salt: u64, name: &str, n_shards: usize) -> usize {
	let mut hasher = DefaultHasher::new();
	salt.hash(&mut hasher);
	name.hash(&mut hasher);
	(hasher.finish() as usize) % n_shards.max(1)
}

pub struct Collection {
	shards: Vec<Box<dyn SimIndex>>,
	salt: u64,
	/// >0 while a reconciliation pass is already in flight; nested triggers
	/// become no-ops.
	reconciling: u32,
	global_n: Option<u64>,
	global_df: Option<HashMap<String, u64>>,
	/// Set on the collection that owns the fan-out; leaf proxies in a
	/// sub-collection don't re-broadcast -- only the root does.
	is_root: bool,
}

impl Collection {
	pub fn new(shards: Vec<Box<dyn SimIndex>>, salt: u64) -> Self {
		Self {
			shards,
			salt,
			reconciling: 0,
			global_n: None,
			global_df: None,
			is_root: true,
		}
	}

	pub fn set_root(&mut self, is_root: bool) {
		self.is_root = is_root;
	}

	fn shard_for(&self, name: &str) -> usize {
		default_shard_func(self.salt, name, self.shards.len())
	}

	/// Pull `get_local_n`/`get_local_df_map` from every shard and push the
	/// aggregate back down via `set_global_n`/`set_global_df_map`. Re-entrant
	/// calls while one is already running are skipped.
	pub fn update_node_stats(&mut self) {
		if self.reconciling > 0 {
			return;
		}
		self.reconciling += 1;

		let mut n = 0u64;
		let mut df: HashMap<String, u64> = HashMap::new();
		for shard in &self.shards {
			n += shard.get_local_n();
			for (term, count) in shard.get_local_df_map() {
				*df.entry(term).or_insert(0) += count;
			}
		}
		self.global_n = Some(n);
		self.global_df = Some(df.clone());

		if self.is_root {
			self.broadcast_node_stats();
		}

		self.reconciling -= 1;
	}

	/// Push the aggregated stats down to every shard so their own scoring
	/// sees the collection-wide `N` and df, not their local counts.
	fn broadcast_node_stats(&mut self) {
		for shard in &mut self.shards {
			shard.set_global_n(self.global_n);
			shard.set_global_df_map(self.global_df.clone());
		}
	}

	pub fn shard_count(&self) -> usize {
		self.shards.len()
	}
}

impl SimIndex for Collection {
	fn index_string_buffers(&mut self, items: Vec<(String, String)>) -> Result<()> {
		let mut by_shard: HashMap<usize, Vec<(String, String)>> = HashMap::new();
		for (name, text) in items {
			let shard = self.shard_for(&name);
			by_shard.entry(shard).or_default().push((name, text));
		}
		for (shard, batch) in by_shard {
			self.shards[shard].index_string_buffers(batch)?;
		}
		self.update_node_stats();
		Ok(())
	}

	fn index_urls(&mut self, urls: Vec<String>, fetcher: Arc<dyn UrlFetcher>) -> Result<()> {
		let mut by_shard: HashMap<usize, Vec<String>> = HashMap::new();
		for url in urls {
			let shard = self.shard_for(&url);
			by_shard.entry(shard).or_default().push(url);
		}
		for (shard, batch) in by_shard {
			self.shards[shard].index_urls(batch, Arc::clone(&fetcher))?;
		}
		self.update_node_stats();
		Ok(())
	}

	fn del_docids(&mut self, docids: Vec<String>) -> Result<()> {
		let mut by_shard: HashMap<usize, Vec<String>> = HashMap::new();
		for node_docid in docids {
			let (shard, local) = split_node_docid(&node_docid)?;
			by_shard.entry(shard).or_default().push(local.to_string());
		}
		for (shard, batch) in by_shard {
			self.shards[shard].del_docids(batch)?;
		}
		self.update_node_stats();
		Ok(())
	}

	fn docid_to_name(&self, docid: &str) -> Result<String> {
		let (shard, local) = split_node_docid(docid)?;
		self.shards
			.get(shard)
			.ok_or_else(|| EngineError::UnknownDocid(docid.to_string()))?
			.docid_to_name(local)
	}

	fn name_to_docid(&self, name: &str) -> Result<String> {
		let shard = self.shard_for(name);
		let local = self.shards[shard].name_to_docid(name)?;
		Ok(make_node_docid(shard, &local))
	}

	fn postings_list(&self, term: &str) -> Vec<(String, u32)> {
		let mut out = Vec::new();
		for (i, shard) in self.shards.iter().enumerate() {
			for (docid, freq) in shard.postings_list(term) {
				out.push((make_node_docid(i, &docid), freq));
			}
		}
		out
	}

	fn query(&self, q: &str) -> Vec<(String, f64)> {
		let mut hits = Vec::new();
		for shard in &self.shards {
			hits.extend(shard.query(q));
		}
		crate::scorer::sort_hits(hits)
	}

	fn query_vec(&self, q: &TermVec) -> Vec<(String, f64)> {
		let mut hits = Vec::new();
		for shard in &self.shards {
			hits.extend(shard.query_vec(q));
		}
		crate::scorer::sort_hits(hits)
	}

	fn config(&self, key: &str) -> Result<Value> {
		self.shards
			.first()
			.ok_or_else(|| EngineError::Malformed("collection has no shards".to_string()))?
			.config(key)
	}

	fn set_config(&mut self, key: &str, value: Value) -> Result<()> {
		for shard in &mut self.shards {
			shard.set_config(key, value.clone())?;
		}
		Ok(())
	}

	fn set_query_scorer(&mut self, scorer: ScorerArg) -> Result<()> {
		match scorer {
			ScorerArg::Name(name) => {
				for shard in &mut self.shards {
					shard.set_query_scorer(ScorerArg::Name(name.clone()))?;
				}
				Ok(())
			}
			ScorerArg::Instance(_) => Err(EngineError::ScorerNotTransportable(
				"an instance scorer cannot be broadcast to multiple shards".to_string(),
			)),
		}
	}

	fn get_local_n(&self) -> u64 {
		self.shards.iter().map(|s| s.get_local_n()).sum()
	}

	fn get_local_df_map(&self) -> HashMap<String, u64> {
		let mut df: HashMap<String, u64> = HashMap::new();
		for shard in &self.shards {
			for (term, count) in shard.get_local_df_map() {
				*df.entry(term).or_insert(0) += count;
			}
		}
		df
	}

	fn get_name_to_docid_map(&self) -> HashMap<String, String> {
		let mut out = HashMap::new();
		for (i, shard) in self.shards.iter().enumerate() {
			for (name, docid) in shard.get_name_to_docid_map() {
				out.insert(name, make_node_docid(i, &docid));
			}
		}
		out
	}

	/// Records the pushed-down stats locally and forwards them to every
	/// shard in turn, so a non-root collection sitting between the true
	/// root and its leaves still relays the broadcast instead of dead-ending
	/// it.
	fn set_global_n(&mut self, n: Option<u64>) {
		self.global_n = n;
		for shard in &mut self.shards {
			shard.set_global_n(n);
		}
	}

	fn set_global_df_map(&mut self, df_map: Option<HashMap<String, u64>>) {
		self.global_df = df_map.clone();
		for shard in &mut self.shards {
			shard.set_global_df_map(df_map.clone());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::index::MemoryIndex;

	fn two_shard_collection() -> Collection {
		let shard0: Box<dyn SimIndex> = Box::new(MemoryIndex::new());
		let shard1: Box<dyn SimIndex> = Box::new(MemoryIndex::new());
		Collection::new(vec![shard0, shard1], 42)
	}

	#[test]
	fn node_docid_round_trips() {
		let encoded = make_node_docid(1, "7");
		assert_eq!(encoded, "1-7");
		let (shard, local) = split_node_docid(&encoded).unwrap();
		assert_eq!(shard, 1);
		assert_eq!(local, "7");
	}

	#[test]
	fn split_node_docid_rejects_malformed_input() {
		assert!(split_node_docid("no-dash-missing-shard-number").is_err());
		assert!(split_node_docid("noseparator").is_err());
	}

	#[test]
	fn index_then_query_spans_shards() {
		let mut coll = two_shard_collection();
		coll.index_string_buffers(vec![
			("doc1".to_string(), "hello world".to_string()),
			("doc2".to_string(), "hello there".to_string()),
			("doc3".to_string(), "hello rust".to_string()),
		])
		.unwrap();

		let hits = coll.query("hello");
		assert_eq!(hits.len(), 3);
		assert_eq!(coll.get_local_n(), 3);
	}

	#[test]
	fn stats_reconcile_across_shards() {
		let mut coll = two_shard_collection();
		coll.index_string_buffers(vec![
			("doc1".to_string(), "hello world".to_string()),
			("doc2".to_string(), "hello there".to_string()),
		])
		.unwrap();
		coll.update_node_stats();
		assert_eq!(coll.global_n, Some(2));
		assert!(coll.global_df.as_ref().unwrap().get("hello").copied().unwrap_or(0) <= 2);
	}

	#[test]
	fn reconciliation_is_reentrant_safe() {
		let mut coll = two_shard_collection();
		coll.index_string_buffers(vec![("doc1".to_string(), "hello".to_string())])
			.unwrap();
		coll.reconciling = 1;
		coll.update_node_stats();
		// Reconciling flag was already set, so no stats were computed yet.
		assert!(coll.global_n.is_none());
		coll.reconciling = 0;
		coll.update_node_stats();
		assert_eq!(coll.global_n, Some(1));
	}

	#[test]
	fn delete_by_compound_docid_routes_to_owning_shard() {
		let mut coll = two_shard_collection();
		coll.index_string_buffers(vec![("doc1".to_string(), "hello".to_string())])
			.unwrap();
		let node_docid = coll.name_to_docid("doc1").unwrap();
		coll.del_docids(vec![node_docid]).unwrap();
		assert_eq!(coll.get_local_n(), 0);
	}

	#[test]
	fn instance_scorer_cannot_broadcast() {
		let mut coll = two_shard_collection();
		let err = coll
			.set_query_scorer(ScorerArg::Instance(Box::new(crate::scorer::SimpleCountScorer)))
			.unwrap_err();
		assert_eq!(err.code(), "SIM_SCORER_NOT_TRANSPORTABLE");
	}
}
