// ---------------------------------------------------------------------------
// Scorer registry and the two reserved scorers
// ---------------------------------------------------------------------------
//
// Ported from pysimsearch's query_scorer.py: a name -> factory registry
// plus SimpleCountQueryScorer and TFIDFQueryScorer. Re-expressed as a
// trait object registry behind a process-wide `OnceLock`, never mutated
// after startup in library code except through explicit registration calls.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::term_vec::TermVec;

/// A single posting: (docid, frequency).
pub type Posting = (String, u32);

/// Everything a scorer needs to know about the corpus beyond the postings
/// lists themselves.
pub trait Corpus {
	/// Live document count (`N`), or global `N` if one has been pushed down.
	fn n(&self) -> u64;
	/// Document frequency for `term`; `1` if the term is unknown, to avoid
	/// division-by-zero in idf.
	fn df(&self, term: &str) -> u64;
	/// L2 norm of the raw term vector for `docid`; `0.0` if unknown (callers
	/// must then skip the term).
	fn doclen(&self, docid: &str) -> f64;
}

/// `score(query_vec, postings_lists, corpus)` -> ranked `(docid, score)`,
/// sorted by score descending.
///
/// Implementations must be side-effect free with respect to scoring so a
/// single instance can be shared across threads.
pub trait Scorer: Send + Sync {
	fn score(
		&self,
		query_vec: &TermVec,
		postings_lists: &[(String, Vec<Posting>)],
		corpus: &dyn Corpus,
	) -> Vec<(String, f64)>;
}

/// Sort `(docid, score)` pairs by score descending, docid ascending as a
/// deterministic tiebreak. Exposed so callers merging hits from multiple
/// scorer invocations (e.g. a sharded collection) can restore the same
/// ordering contract after concatenation.
pub fn sort_hits(hits: Vec<(String, f64)>) -> Vec<(String, f64)> {
	sort_desc(hits)
}

fn sort_desc(mut hits: Vec<(String, f64)>) -> Vec<(String, f64)> {
	hits.sort_by(|a, b| {
		b.1.partial_cmp(&a.1)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then_with(|| a.0.cmp(&b.0))
	});
	hits
}

// ---------------------------------------------------------------------------
// simple_count
// ---------------------------------------------------------------------------

/// Sums posting frequencies over the intersection of query terms and
/// postings; query-term multiplicities are ignored, matching the worked
/// examples this variant is tested against.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleCountScorer;

impl Scorer for SimpleCountScorer {
	fn score(
		&self,
		_query_vec: &TermVec,
		postings_lists: &[(String, Vec<Posting>)],
		_corpus: &dyn Corpus,
	) -> Vec<(String, f64)> {
		let mut hits: HashMap<String, f64> = HashMap::new();
		for (_term, postings) in postings_lists {
			for (docid, freq) in postings {
				*hits.entry(docid.clone()).or_insert(0.0) += *freq as f64;
			}
		}
		sort_desc(hits.into_iter().collect())
	}
}

// ---------------------------------------------------------------------------
// tfidf
// ---------------------------------------------------------------------------

/// tf-weighting strategy for [`TfIdfScorer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfWeight {
	Raw,
	Log,
}

impl Default for TfWeight {
	fn default() -> Self {
		Self::Raw
	}
}

fn tf_weight(kind: TfWeight, tf: f64) -> f64 {
	match kind {
		TfWeight::Raw => tf,
		TfWeight::Log => {
			if tf > 0.0 {
				1.0 + tf.ln()
			} else {
				0.0
			}
		}
	}
}

/// tf·idf weighted cosine scorer. Query length is not factored in (it's a
/// monotonic transform that doesn't affect relative ordering).
#[derive(Debug, Clone, Copy)]
pub struct TfIdfScorer {
	pub tf_weight: TfWeight,
}

impl Default for TfIdfScorer {
	fn default() -> Self {
		Self {
			tf_weight: TfWeight::default(),
		}
	}
}

impl Scorer for TfIdfScorer {
	fn score(
		&self,
		query_vec: &TermVec,
		postings_lists: &[(String, Vec<Posting>)],
		corpus: &dyn Corpus,
	) -> Vec<(String, f64)> {
		let n = corpus.n();
		if n == 0 {
			return Vec::new();
		}
		let n = n as f64;

		let mut hits: HashMap<String, f64> = HashMap::new();
		for (term, postings) in postings_lists {
			let df = corpus.df(term).max(1) as f64;
			let idf = (n / df).ln();
			let q_tf = *query_vec.get(term).unwrap_or(&0) as f64;
			let query_weight = tf_weight(self.tf_weight, q_tf) * idf;
			for (docid, freq) in postings {
				let contribution = tf_weight(self.tf_weight, *freq as f64) * query_weight;
				*hits.entry(docid.clone()).or_insert(0.0) += contribution;
			}
		}

		let mut scored = Vec::with_capacity(hits.len());
		for (docid, weight) in hits {
			let doclen = corpus.doclen(&docid);
			if doclen == 0.0 {
				continue;
			}
			scored.push((docid, weight / doclen));
		}
		sort_desc(scored)
	}
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type ScorerFactory = fn() -> Box<dyn Scorer>;

fn registry() -> &'static Mutex<HashMap<String, ScorerFactory>> {
	static REGISTRY: OnceLock<Mutex<HashMap<String, ScorerFactory>>> = OnceLock::new();
	REGISTRY.get_or_init(|| {
		let mut map: HashMap<String, ScorerFactory> = HashMap::new();
		map.insert("simple_count".to_string(), || Box::new(SimpleCountScorer));
		map.insert("tfidf".to_string(), || Box::new(TfIdfScorer::default()));
		Mutex::new(map)
	})
}

/// Register (or overwrite) a scorer factory under `name`. Re-registering an
/// existing name is allowed -- last write wins, matching the reference
/// `QueryScorer.register_scorers()` dict-update semantics.
pub fn register_scorer(name: &str, factory: ScorerFactory) {
	registry()
		.lock()
		.expect("scorer registry poisoned")
		.insert(name.to_string(), factory);
}

/// Construct a scorer by registry name.
pub fn make_scorer(name: &str) -> crate::error::Result<Box<dyn Scorer>> {
	registry()
		.lock()
		.expect("scorer registry poisoned")
		.get(name)
		.map(|f| f())
		.ok_or_else(|| crate::error::EngineError::Malformed(format!("unknown scorer: {name}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tv(pairs: &[(&str, u32)]) -> TermVec {
		pairs.iter().map(|(t, f)| (t.to_string(), *f)).collect()
	}

	struct FixedCorpus {
		n: u64,
		df: HashMap<String, u64>,
		doclen: HashMap<String, f64>,
	}

	impl Corpus for FixedCorpus {
		fn n(&self) -> u64 {
			self.n
		}
		fn df(&self, term: &str) -> u64 {
			*self.df.get(term).unwrap_or(&1)
		}
		fn doclen(&self, docid: &str) -> f64 {
			*self.doclen.get(docid).unwrap_or(&0.0)
		}
	}

	#[test]
	fn simple_count_sums_postings_ignoring_query_multiplicity() {
		let query = tv(&[("hello", 1), ("world", 1)]);
		let postings = vec![
			(
				"hello".to_string(),
				vec![("doc1".to_string(), 2), ("doc2".to_string(), 1), ("doc3".to_string(), 1)],
			),
			("world".to_string(), vec![("doc1".to_string(), 1), ("doc2".to_string(), 1)]),
		];
		let corpus = FixedCorpus {
			n: 3,
			df: HashMap::new(),
			doclen: HashMap::new(),
		};
		let hits = SimpleCountScorer.score(&query, &postings, &corpus);
		assert_eq!(
			hits,
			vec![
				("doc1".to_string(), 3.0),
				("doc2".to_string(), 2.0),
				("doc3".to_string(), 1.0),
			]
		);
	}

	#[test]
	fn tfidf_empty_corpus_returns_empty() {
		let query = tv(&[("hello", 1)]);
		let postings = vec![("hello".to_string(), vec![("doc1".to_string(), 1)])];
		let corpus = FixedCorpus {
			n: 0,
			df: HashMap::new(),
			doclen: HashMap::new(),
		};
		let hits = TfIdfScorer::default().score(&query, &postings, &corpus);
		assert!(hits.is_empty());
	}

	#[test]
	fn tfidf_matches_worked_example() {
		// N=3, idf(hello)=ln(3/3)=0, idf(there)=ln(3/2)
		let query = tv(&[("hello", 1), ("there", 1)]);
		let postings = vec![
			("hello".to_string(), vec![("doc1".to_string(), 2)]),
			("there".to_string(), vec![("doc1".to_string(), 1)]),
		];
		let mut df = HashMap::new();
		df.insert("hello".to_string(), 3);
		df.insert("there".to_string(), 2);
		let mut doclen = HashMap::new();
		doclen.insert("doc1".to_string(), (2f64.powi(2) + 1.0 + 1.0).sqrt());
		let corpus = FixedCorpus { n: 3, df, doclen };
		let hits = TfIdfScorer::default().score(&query, &postings, &corpus);
		assert_eq!(hits.len(), 1);
		let expected = (2.0 * 0.0 + 1.0 * (3.0f64 / 2.0).ln()) / (2f64.powi(2) + 1.0 + 1.0).sqrt();
		assert!((hits[0].1 - expected).abs() < 1e-3);
	}

	#[test]
	fn registry_resolves_reserved_names() {
		assert!(make_scorer("simple_count").is_ok());
		assert!(make_scorer("tfidf").is_ok());
		assert!(make_scorer("nonexistent").is_err());
	}

	#[test]
	fn registering_twice_is_last_write_wins() {
		register_scorer("simple_count", || Box::new(SimpleCountScorer));
		register_scorer("simple_count", || Box::new(SimpleCountScorer));
		assert!(make_scorer("simple_count").is_ok());
	}
}
