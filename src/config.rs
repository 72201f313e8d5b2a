// ---------------------------------------------------------------------------
// Index configuration -- lowercase policy + stoplist
// ---------------------------------------------------------------------------
//
// A plain struct with a `Default` impl, plus a keyed
// `config`/`set_config`/`update_config` view on top so the surface stays
// transport-friendly (string keys, JSON-ish values) the way the original
// Python `_config` dict was.
// ---------------------------------------------------------------------------

use std::collections::HashSet;

use crate::error::{EngineError, Result};
use crate::term_vec::TermVecConfig;

#[derive(Debug, Clone)]
pub struct IndexConfig {
	pub lowercase: bool,
	pub stoplist: HashSet<String>,
}

impl Default for IndexConfig {
	fn default() -> Self {
		Self {
			lowercase: true,
			stoplist: HashSet::new(),
		}
	}
}

impl IndexConfig {
	pub fn term_vec_config(&self) -> TermVecConfig {
		TermVecConfig {
			lowercase: self.lowercase,
			stoplist: self.stoplist.clone(),
		}
	}

	/// Read a recognised config key as a JSON value (for RPC marshalling).
	pub fn get(&self, key: &str) -> Result<serde_json::Value> {
		match key {
			"lowercase" => Ok(serde_json::json!(self.lowercase)),
			"stoplist" => Ok(serde_json::json!(self.stoplist)),
			other => Err(EngineError::UnknownConfigKey(other.to_string())),
		}
	}

	/// Set a single recognised config key from a JSON value.
	pub fn set(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
		match key {
			"lowercase" => {
				self.lowercase = value.as_bool().ok_or_else(|| {
					EngineError::Malformed("lowercase must be a bool".to_string())
				})?;
				Ok(())
			}
			"stoplist" => {
				let arr = value.as_array().ok_or_else(|| {
					EngineError::Malformed("stoplist must be an array of strings".to_string())
				})?;
				let mut set = HashSet::with_capacity(arr.len());
				for v in arr {
					let s = v.as_str().ok_or_else(|| {
						EngineError::Malformed("stoplist entries must be strings".to_string())
					})?;
					set.insert(s.to_string());
				}
				self.stoplist = set;
				Ok(())
			}
			other => Err(EngineError::UnknownConfigKey(other.to_string())),
		}
	}

	/// Merge every key in `updates` into this config.
	pub fn update(&mut self, updates: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
		for (key, value) in updates {
			self.set(key, value.clone())?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_is_lowercase_empty_stoplist() {
		let c = IndexConfig::default();
		assert!(c.lowercase);
		assert!(c.stoplist.is_empty());
	}

	#[test]
	fn set_and_get_lowercase() {
		let mut c = IndexConfig::default();
		c.set("lowercase", serde_json::json!(false)).unwrap();
		assert_eq!(c.get("lowercase").unwrap(), serde_json::json!(false));
	}

	#[test]
	fn set_idempotent() {
		let mut c = IndexConfig::default();
		c.set("lowercase", serde_json::json!(false)).unwrap();
		c.set("lowercase", serde_json::json!(false)).unwrap();
		assert!(!c.lowercase);
	}

	#[test]
	fn unknown_key_errors() {
		let c = IndexConfig::default();
		assert!(c.get("nope").is_err());
	}
}
