// ---------------------------------------------------------------------------
// SimIndex -- the capability set shared by every node kind
// ---------------------------------------------------------------------------
//
// The original Python library uses an inheritance lattice (SimIndex base,
// Memory/Storage/Collection/RemoteProxy/Concurrent subclasses). Here that
// collapses into a single object-safe trait that every node kind implements:
// a leaf memory index, a storage-backed leaf, a sharded collection, a remote
// proxy, and a concurrency envelope that delegates to any of the above.
// Every generator-returning operation in the original is materialised into a
// `Vec` at this boundary instead.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::scorer::Scorer;

/// Argument to `set_query_scorer`: a registry name (required whenever the
/// call may cross a remote boundary) or an already-constructed instance
/// (local trees only).
pub enum ScorerArg {
	Name(String),
	Instance(Box<dyn Scorer>),
}

impl From<&str> for ScorerArg {
	fn from(name: &str) -> Self {
		ScorerArg::Name(name.to_string())
	}
}

impl From<String> for ScorerArg {
	fn from(name: String) -> Self {
		ScorerArg::Name(name)
	}
}

impl From<Box<dyn Scorer>> for ScorerArg {
	fn from(scorer: Box<dyn Scorer>) -> Self {
		ScorerArg::Instance(scorer)
	}
}

/// The full public operation set of a similarity index node, covering
/// leaves, collections, proxies, and the concurrency envelope uniformly.
pub trait SimIndex: Send {
	/// Ingest `(name, text)` pairs. Preconditions: each name is fresh.
	fn index_string_buffers(&mut self, items: Vec<(String, String)>) -> Result<()>;

	/// Convenience wrapper: read each path and forward to
	/// `index_string_buffers`.
	fn index_files(&mut self, named_paths: Vec<(String, std::path::PathBuf)>) -> Result<()> {
		let mut buffers = Vec::with_capacity(named_paths.len());
		for (name, path) in named_paths {
			let text = std::fs::read_to_string(&path)?;
			buffers.push((name, text));
		}
		self.index_string_buffers(buffers)
	}

	/// Convenience wrapper: index `filenames`, using each path as its own
	/// document name.
	fn index_filenames(&mut self, filenames: Vec<String>) -> Result<()> {
		let named = filenames.into_iter().map(|f| (f.clone(), f.into())).collect();
		self.index_files(named)
	}

	/// Fetch and index `urls` via `fetcher`. Per-URL failures are logged and
	/// skipped rather than aborting the whole batch. Takes an `Arc` rather
	/// than a borrow so implementations that hand the batch to a background
	/// job (the concurrency envelope) can move it in without the caller's
	/// lifetime leaking into the job.
	fn index_urls(&mut self, urls: Vec<String>, fetcher: Arc<dyn crate::fetch::UrlFetcher>) -> Result<()> {
		let mut buffers = Vec::with_capacity(urls.len());
		for url in urls {
			match fetcher.fetch(&url) {
				Ok(text) => buffers.push((url, text)),
				Err(e) => tracing::error!("fetch failed for {url}: {e}"),
			}
		}
		self.index_string_buffers(buffers)
	}

	/// Remove documents by docid. Unknown ids are tolerated silently.
	fn del_docids(&mut self, docids: Vec<String>) -> Result<()>;

	fn docid_to_name(&self, docid: &str) -> Result<String>;
	fn name_to_docid(&self, name: &str) -> Result<String>;

	/// Postings list for the canonicalised term, or empty if absent.
	fn postings_list(&self, term: &str) -> Vec<(String, u32)>;

	/// Intersection of postings-docid sets across all given terms, sorted.
	/// Empty input returns empty.
	fn docids_with_terms(&self, terms: &[String]) -> Vec<String> {
		if terms.is_empty() {
			return Vec::new();
		}
		let mut sets = terms.iter().map(|t| {
			self.postings_list(t)
				.into_iter()
				.map(|(docid, _)| docid)
				.collect::<std::collections::HashSet<_>>()
		});
		let mut acc = match sets.next() {
			Some(s) => s,
			None => return Vec::new(),
		};
		for s in sets {
			acc.retain(|d| s.contains(d));
		}
		let mut out: Vec<String> = acc.into_iter().collect();
		out.sort();
		out
	}

	/// Translation of `docids_with_terms` to names, after canonicalising
	/// terms under this index's `lowercase` policy.
	fn docnames_with_terms(&self, terms: &[String]) -> Result<Vec<String>> {
		let canon = self.canonicalize_terms(terms);
		let ids = self.docids_with_terms(&canon);
		ids.iter().map(|id| self.docid_to_name(id)).collect()
	}

	/// Lowercase each term iff this index's `lowercase` policy is set.
	fn canonicalize_terms(&self, terms: &[String]) -> Vec<String> {
		if self.config("lowercase").ok().and_then(|v| v.as_bool()) == Some(true) {
			terms.iter().map(|t| t.to_lowercase()).collect()
		} else {
			terms.to_vec()
		}
	}

	/// Tokenise `q` through this index's term-vector builder, then score.
	fn query(&self, q: &str) -> Vec<(String, f64)>;

	/// Score a pre-built query vector directly.
	fn query_vec(&self, q: &crate::term_vec::TermVec) -> Vec<(String, f64)>;

	/// Replace the configured stoplist from raw stoplist-file text.
	fn load_stoplist(&mut self, text: &str) -> Result<()> {
		let stoplist = crate::term_vec::read_stoplist(text.as_bytes())?;
		self.set_config(
			"stoplist",
			Value::Array(stoplist.into_iter().map(Value::String).collect()),
		)
	}

	fn config(&self, key: &str) -> Result<Value>;
	fn set_config(&mut self, key: &str, value: Value) -> Result<()>;
	fn update_config(&mut self, updates: serde_json::Map<String, Value>) -> Result<()> {
		for (k, v) in updates {
			self.set_config(&k, v)?;
		}
		Ok(())
	}

	fn set_query_scorer(&mut self, scorer: ScorerArg) -> Result<()>;

	/// Local document count, read by a parent collection for reconciliation.
	fn get_local_n(&self) -> u64;
	/// Local document-frequency stats, read by a parent collection.
	fn get_local_df_map(&self) -> HashMap<String, u64>;
	/// Local name -> docid mapping, read by a parent collection.
	fn get_name_to_docid_map(&self) -> HashMap<String, String>;

	/// Push down aggregated `N`; shadows the local value during scoring when
	/// `Some`.
	fn set_global_n(&mut self, n: Option<u64>);
	/// Push down aggregated df stats; shadows the local map when `Some`.
	fn set_global_df_map(&mut self, df_map: Option<HashMap<String, u64>>);
}
