// ---------------------------------------------------------------------------
// ConcurrencyEnvelope -- thread-safety wrapper around any SimIndex
// ---------------------------------------------------------------------------
//
// Grounded on pysimsearch's ConcurrentSimIndex: READ and WRITE methods share
// a single lock (no reader/writer distinction -- the reference uses one
// non-reentrant lock for both), while `index_urls` is NONBLOCKING: the whole
// call, fetch included, is handed off to a background job (bounded to at
// most 10 concurrently running) which takes the lock and calls straight
// through to the wrapped index's own `index_urls`, so a wrapped collection
// still routes each URL to the shard responsible for fetching it. Any READ
// call first drains every outstanding background job so it never observes a
// partially-applied batch.
// ---------------------------------------------------------------------------

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use serde_json::Value;

use crate::error::Result;
use crate::fetch::UrlFetcher;
use crate::sim_index::{ScorerArg, SimIndex};
use crate::term_vec::TermVec;

struct PoolState {
	capacity: usize,
	count: Mutex<usize>,
	slot_free: Condvar,
}

/// A thread pool bounded to `capacity` concurrently running jobs. `spawn`
/// blocks the caller only until a slot is free, not until the job itself
/// finishes -- the job runs in the background and releases its slot when
/// done.
struct BoundedPool {
	state: Arc<PoolState>,
	handles: Mutex<VecDeque<JoinHandle<()>>>,
}

impl BoundedPool {
	fn new(capacity: usize) -> Self {
		Self {
			state: Arc::new(PoolState {
				capacity,
				count: Mutex::new(0),
				slot_free: Condvar::new(),
			}),
			handles: Mutex::new(VecDeque::new()),
		}
	}

	fn spawn(&self, job: impl FnOnce() + Send + 'static) {
		{
			let mut count = self.state.count.lock().expect("pool counter poisoned");
			while *count >= self.state.capacity {
				count = self.state.slot_free.wait(count).expect("pool counter poisoned");
			}
			*count += 1;
		}

		let state = Arc::clone(&self.state);
		let handle = std::thread::spawn(move || {
			job();
			let mut count = state.count.lock().expect("pool counter poisoned");
			*count = count.saturating_sub(1);
			state.slot_free.notify_one();
		});
		self.handles.lock().expect("pool handles poisoned").push_back(handle);
	}

	/// Join every outstanding job. Called before any READ so reads never
	/// observe a half-applied background batch.
	fn drain(&self) {
		let mut handles = self.handles.lock().expect("pool handles poisoned");
		while let Some(handle) = handles.pop_front() {
			let _ = handle.join();
		}
	}
}

const DEFAULT_POOL_CAPACITY: usize = 10;

/// Wraps any `SimIndex` with the locking discipline described above.
pub struct ConcurrencyEnvelope {
	inner: Arc<Mutex<Box<dyn SimIndex>>>,
	pool: BoundedPool,
}

impl ConcurrencyEnvelope {
	pub fn new(inner: Box<dyn SimIndex>) -> Self {
		Self {
			inner: Arc::new(Mutex::new(inner)),
			pool: BoundedPool::new(DEFAULT_POOL_CAPACITY),
		}
	}

	pub fn inner_handle(&self) -> Arc<Mutex<Box<dyn SimIndex>>> {
		Arc::clone(&self.inner)
	}

	fn drain_then_read<T>(&self, f: impl FnOnce(&dyn SimIndex) -> T) -> T {
		self.pool.drain();
		let guard = self.inner.lock().expect("envelope mutex poisoned");
		f(guard.as_ref())
	}

	fn write<T>(&self, f: impl FnOnce(&mut dyn SimIndex) -> T) -> T {
		let mut guard = self.inner.lock().expect("envelope mutex poisoned");
		f(guard.as_mut())
	}
}

impl SimIndex for ConcurrencyEnvelope {
	fn index_string_buffers(&mut self, items: Vec<(String, String)>) -> Result<()> {
		self.write(|inner| inner.index_string_buffers(items))
	}

	fn index_urls(&mut self, urls: Vec<String>, fetcher: Arc<dyn UrlFetcher>) -> Result<()> {
		if urls.is_empty() {
			return Ok(());
		}

		let inner = Arc::clone(&self.inner);
		self.pool.spawn(move || {
			let mut guard = inner.lock().expect("envelope mutex poisoned");
			if let Err(e) = guard.index_urls(urls, fetcher) {
				tracing::error!("background index_urls batch failed: {e}");
			}
		});
		Ok(())
	}

	fn del_docids(&mut self, docids: Vec<String>) -> Result<()> {
		self.write(|inner| inner.del_docids(docids))
	}

	fn docid_to_name(&self, docid: &str) -> Result<String> {
		self.drain_then_read(|inner| inner.docid_to_name(docid))
	}

	fn name_to_docid(&self, name: &str) -> Result<String> {
		self.drain_then_read(|inner| inner.name_to_docid(name))
	}

	fn postings_list(&self, term: &str) -> Vec<(String, u32)> {
		self.drain_then_read(|inner| inner.postings_list(term))
	}

	fn docids_with_terms(&self, terms: &[String]) -> Vec<String> {
		self.drain_then_read(|inner| inner.docids_with_terms(terms))
	}

	fn docnames_with_terms(&self, terms: &[String]) -> Result<Vec<String>> {
		self.drain_then_read(|inner| inner.docnames_with_terms(terms))
	}

	fn query(&self, q: &str) -> Vec<(String, f64)> {
		self.drain_then_read(|inner| inner.query(q))
	}

	fn query_vec(&self, q: &TermVec) -> Vec<(String, f64)> {
		self.drain_then_read(|inner| inner.query_vec(q))
	}

	fn load_stoplist(&mut self, text: &str) -> Result<()> {
		self.write(|inner| inner.load_stoplist(text))
	}

	fn config(&self, key: &str) -> Result<Value> {
		self.drain_then_read(|inner| inner.config(key))
	}

	fn set_config(&mut self, key: &str, value: Value) -> Result<()> {
		self.write(|inner| inner.set_config(key, value))
	}

	fn update_config(&mut self, updates: serde_json::Map<String, Value>) -> Result<()> {
		self.write(|inner| inner.update_config(updates))
	}

	fn set_query_scorer(&mut self, scorer: ScorerArg) -> Result<()> {
		self.write(|inner| inner.set_query_scorer(scorer))
	}

	fn get_local_n(&self) -> u64 {
		self.drain_then_read(|inner| inner.get_local_n())
	}

	fn get_local_df_map(&self) -> HashMap<String, u64> {
		self.drain_then_read(|inner| inner.get_local_df_map())
	}

	fn get_name_to_docid_map(&self) -> HashMap<String, String> {
		self.drain_then_read(|inner| inner.get_name_to_docid_map())
	}

	fn set_global_n(&mut self, n: Option<u64>) {
		self.write(|inner| inner.set_global_n(n))
	}

	fn set_global_df_map(&mut self, df_map: Option<HashMap<String, u64>>) {
		self.write(|inner| inner.set_global_df_map(df_map))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fetch::test_support::FakeFetcher;
	use crate::index::MemoryIndex;

	fn envelope() -> ConcurrencyEnvelope {
		ConcurrencyEnvelope::new(Box::new(MemoryIndex::new()))
	}

	#[test]
	fn write_then_read_is_immediately_consistent() {
		let mut env = envelope();
		env.index_string_buffers(vec![("doc1".to_string(), "hello world".to_string())])
			.unwrap();
		assert_eq!(env.get_local_n(), 1);
	}

	#[test]
	fn index_urls_is_visible_after_a_read_drains_the_pool() {
		let mut env = envelope();
		env.set_query_scorer(ScorerArg::Name("simple_count".to_string())).unwrap();
		let fetcher: Arc<dyn crate::fetch::UrlFetcher> = Arc::new(FakeFetcher::with(&[("http://x/doc1", "hello world")]));
		env.index_urls(vec!["http://x/doc1".to_string()], Arc::clone(&fetcher)).unwrap();

		// A READ call drains outstanding background jobs first, so this
		// always observes the completed batch regardless of scheduling.
		let hits = env.query("hello");
		assert_eq!(hits, vec![("http://x/doc1".to_string(), 1.0)]);
	}

	#[test]
	fn index_urls_skips_failed_fetches_without_aborting_the_batch() {
		let mut env = envelope();
		let fetcher: Arc<dyn crate::fetch::UrlFetcher> = Arc::new(FakeFetcher::with(&[("http://x/ok", "hello")]));
		env.index_urls(
			vec!["http://x/ok".to_string(), "http://x/missing".to_string()],
			fetcher,
		)
		.unwrap();
		assert_eq!(env.get_local_n(), 1);
	}

	#[test]
	fn many_concurrent_url_batches_stay_within_pool_capacity() {
		let mut env = envelope();
		let pages: Vec<(String, String)> = (0..25)
			.map(|i| (format!("http://x/{i}"), "hello".to_string()))
			.collect();
		let refs: Vec<(&str, &str)> = pages.iter().map(|(u, t)| (u.as_str(), t.as_str())).collect();
		let fetcher: Arc<dyn crate::fetch::UrlFetcher> = Arc::new(FakeFetcher::with(&refs));
		for (url, _) in &pages {
			env.index_urls(vec![url.clone()], Arc::clone(&fetcher)).unwrap();
		}
		assert_eq!(env.get_local_n(), 25);
	}
}
