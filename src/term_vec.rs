// ---------------------------------------------------------------------------
// Term-vector builder -- tokenise a stream into a term -> frequency map
// ---------------------------------------------------------------------------
//
// Ported from the stoplist/lowercase policy in pysimsearch's term_vec.py.
// ---------------------------------------------------------------------------

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

/// A term -> positive-integer-frequency mapping. Key order is irrelevant.
pub type TermVec = HashMap<String, u32>;

/// Tokenisation / case-folding policy shared by ingestion and queries.
#[derive(Debug, Clone)]
pub struct TermVecConfig {
	pub lowercase: bool,
	pub stoplist: HashSet<String>,
}

impl Default for TermVecConfig {
	fn default() -> Self {
		Self {
			lowercase: true,
			stoplist: HashSet::new(),
		}
	}
}

/// Build a term vector from `input`, line by line, splitting each line on
/// runs of whitespace.
///
/// The stoplist is checked against the *raw* token, before case folding --
/// this matches the reference behavior and is observable: a stoplist entry
/// in a different case than the document text will not filter it out.
pub fn term_vec<R: BufRead>(input: R, config: &TermVecConfig) -> std::io::Result<TermVec> {
	let mut tf = TermVec::new();
	for line in input.lines() {
		let line = line?;
		for raw_token in line.split_whitespace() {
			if config.stoplist.contains(raw_token) {
				continue;
			}
			let term = if config.lowercase {
				raw_token.to_lowercase()
			} else {
				raw_token.to_string()
			};
			*tf.entry(term).or_insert(0) += 1;
		}
	}
	Ok(tf)
}

/// Convenience wrapper over [`term_vec`] for an in-memory string.
pub fn term_vec_from_str(input: &str, config: &TermVecConfig) -> TermVec {
	term_vec(input.as_bytes(), config).expect("reading from a string cannot fail")
}

/// Tokenise a stoplist stream: whitespace-separated tokens, arbitrary line
/// structure, no case folding applied to the stoplist itself (consumed by
/// `load_stoplist`).
pub fn read_stoplist<R: BufRead>(input: R) -> std::io::Result<HashSet<String>> {
	let mut set = HashSet::new();
	for line in input.lines() {
		let line = line?;
		for token in line.split_whitespace() {
			set.insert(token.to_string());
		}
	}
	Ok(set)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cfg(lowercase: bool, stoplist: &[&str]) -> TermVecConfig {
		TermVecConfig {
			lowercase,
			stoplist: stoplist.iter().map(|s| s.to_string()).collect(),
		}
	}

	#[test]
	fn basic_counts() {
		let tv = term_vec_from_str("hello world hello", &cfg(true, &[]));
		assert_eq!(tv.get("hello"), Some(&2));
		assert_eq!(tv.get("world"), Some(&1));
	}

	#[test]
	fn stoplist_checked_before_case_folding() {
		// Stoplist contains "Stopword" (capitalized); the raw token is
		// lowercase "stopword", so it is NOT filtered -- membership is
		// checked against the raw token.
		let tv = term_vec_from_str("stopword hello", &cfg(true, &["Stopword"]));
		assert_eq!(tv.get("stopword"), Some(&1));
		assert_eq!(tv.get("hello"), Some(&1));
	}

	#[test]
	fn stoplist_filters_exact_raw_match() {
		let tv = term_vec_from_str("stopword1 hello stopword1", &cfg(true, &["stopword1"]));
		assert!(!tv.contains_key("stopword1"));
		assert_eq!(tv.get("hello"), Some(&1));
	}

	#[test]
	fn lowercase_policy() {
		let tv = term_vec_from_str("Hello HELLO", &cfg(false, &[]));
		assert_eq!(tv.get("Hello"), Some(&1));
		assert_eq!(tv.get("HELLO"), Some(&1));
	}

	#[test]
	fn multiline_whitespace_splitting() {
		let tv = term_vec_from_str("hello   world\nworld\tthere", &cfg(true, &[]));
		assert_eq!(tv.get("hello"), Some(&1));
		assert_eq!(tv.get("world"), Some(&2));
		assert_eq!(tv.get("there"), Some(&1));
	}

	#[test]
	fn empty_input_gives_empty_vector() {
		let tv = term_vec_from_str("", &cfg(true, &[]));
		assert!(tv.is_empty());
	}

	#[test]
	fn read_stoplist_is_whitespace_tokenised() {
		let set = read_stoplist("a b\nc   d\n".as_bytes()).unwrap();
		assert_eq!(set.len(), 4);
		assert!(set.contains("a") && set.contains("d"));
	}
}
