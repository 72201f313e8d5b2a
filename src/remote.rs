// ---------------------------------------------------------------------------
// RemoteProxy -- a SimIndex that forwards every call over the wire
// ---------------------------------------------------------------------------
//
// Grounded on pysimsearch's RemoteSimIndex (a jsonrpclib ServerProxy wrapped
// in the SimIndex interface), re-expressed over an NDJSON/JSON-RPC client.
// `MethodChannel` is an opaque method-dispatch channel: callers only know it
// can run a named method with JSON params and get a JSON result back, never
// how the bytes get there. Only the fixed
// whitelist of methods below is forwarded; anything else is rejected before
// a request is ever sent, so a proxy can't accidentally expose local-only
// operations (like installing an instance scorer) across the wire.
//
// The channel sits behind a `Mutex` so every `SimIndex` method -- read or
// write -- can reach it through `&self`/`&mut self` alike; a synchronous
// request/response round trip needs exclusive access to the connection
// regardless of whether the call is conceptually a read or a write.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::fetch::UrlFetcher;
use crate::protocol::JsonRpcRequest;
use crate::sim_index::{ScorerArg, SimIndex};
use crate::term_vec::TermVec;
use crate::transport::{NdjsonReader, NdjsonWriter};

/// The methods a `RemoteProxy` is permitted to forward. Kept as a const
/// slice (not derived from the `SimIndex` trait) so adding a new local-only
/// convenience method never silently becomes remotely callable.
pub const REMOTE_METHOD_WHITELIST: &[&str] = &[
	"index_string_buffers",
	"index_urls",
	"del_docids",
	"docid_to_name",
	"name_to_docid",
	"postings_list",
	"docids_with_terms",
	"docnames_with_terms",
	"query",
	"query_vec",
	"load_stoplist",
	"config",
	"set_config",
	"update_config",
	"set_query_scorer",
	"get_local_n",
	"get_local_df_map",
	"get_name_to_docid_map",
	"set_global_n",
	"set_global_df_map",
];

/// An opaque method-dispatch channel: send a method name and JSON params,
/// get a JSON result back. `RemoteProxy` never needs to know what's on the
/// other end of this.
pub trait MethodChannel: Send {
	fn call(&mut self, method: &str, params: Value) -> Result<Value>;
}

/// A `MethodChannel` backed by a TCP connection speaking NDJSON JSON-RPC.
pub struct TcpMethodChannel {
	reader: NdjsonReader<TcpStream>,
	writer: NdjsonWriter<TcpStream>,
	next_id: u64,
}

impl TcpMethodChannel {
	pub fn connect(addr: &str) -> Result<Self> {
		let stream = TcpStream::connect(addr)?;
		let read_half = stream.try_clone()?;
		Ok(Self {
			reader: NdjsonReader::new(read_half),
			writer: NdjsonWriter::new(stream),
			next_id: 0,
		})
	}
}

impl MethodChannel for TcpMethodChannel {
	fn call(&mut self, method: &str, params: Value) -> Result<Value> {
		let id = self.next_id;
		self.next_id += 1;
		let request = JsonRpcRequest {
			jsonrpc: "2.0".to_string(),
			method: method.to_string(),
			params,
			id: Some(Value::from(id)),
		};
		self.writer.write_line(&request)?;

		let response = self
			.reader
			.read_value()?
			.ok_or_else(|| EngineError::Malformed("connection closed before a response arrived".to_string()))?;

		if let Some(error) = response.get("error") {
			let message = error
				.get("message")
				.and_then(Value::as_str)
				.unwrap_or("remote call failed")
				.to_string();
			return Err(EngineError::Malformed(message));
		}
		Ok(response.get("result").cloned().unwrap_or(Value::Null))
	}
}

/// An in-process channel for tests: dispatches directly into a boxed
/// `SimIndex` via [`crate::server::dispatch_method`] instead of going over a
/// real socket, so proxy behaviour is testable without spawning a server.
pub struct LoopbackChannel {
	pub target: Box<dyn SimIndex>,
	pub fetcher: Arc<dyn UrlFetcher>,
}

impl LoopbackChannel {
	pub fn new(target: Box<dyn SimIndex>) -> Self {
		Self {
			target,
			fetcher: Arc::new(crate::fetch::UnimplementedFetcher::default()),
		}
	}

	pub fn with_fetcher(target: Box<dyn SimIndex>, fetcher: Arc<dyn UrlFetcher>) -> Self {
		Self { target, fetcher }
	}
}

impl MethodChannel for LoopbackChannel {
	fn call(&mut self, method: &str, params: Value) -> Result<Value> {
		crate::server::dispatch_method(self.target.as_mut(), method, params, &self.fetcher)
	}
}

fn require_whitelisted(method: &str) -> Result<()> {
	if REMOTE_METHOD_WHITELIST.contains(&method) {
		Ok(())
	} else {
		Err(EngineError::UnsupportedMethod(method.to_string()))
	}
}

/// A `SimIndex` that forwards every call through a `MethodChannel`.
pub struct RemoteProxy<C: MethodChannel> {
	channel: Mutex<C>,
}

impl<C: MethodChannel> RemoteProxy<C> {
	pub fn new(channel: C) -> Self {
		Self {
			channel: Mutex::new(channel),
		}
	}

	fn call(&self, method: &str, params: Value) -> Result<Value> {
		require_whitelisted(method)?;
		self.channel.lock().expect("remote proxy channel poisoned").call(method, params)
	}

	fn call_or_default<T: serde::de::DeserializeOwned + Default>(&self, method: &str, params: Value, context: &str) -> T {
		match self.call(method, params) {
			Ok(value) => serde_json::from_value(value).unwrap_or_default(),
			Err(e) => {
				tracing::error!("remote call to {method} failed ({context}): {e}");
				T::default()
			}
		}
	}
}

impl<C: MethodChannel> SimIndex for RemoteProxy<C> {
	fn index_string_buffers(&mut self, items: Vec<(String, String)>) -> Result<()> {
		self.call("index_string_buffers", serde_json::json!({"items": items}))?;
		Ok(())
	}

	fn index_urls(&mut self, urls: Vec<String>, _fetcher: Arc<dyn UrlFetcher>) -> Result<()> {
		// URLs are pushed over the wire verbatim; the remote side fetches
		// them itself, so the local fetcher is unused here.
		self.call("index_urls", serde_json::json!({"urls": urls}))?;
		Ok(())
	}

	fn del_docids(&mut self, docids: Vec<String>) -> Result<()> {
		self.call("del_docids", serde_json::json!({"docids": docids}))?;
		Ok(())
	}

	fn docid_to_name(&self, docid: &str) -> Result<String> {
		let value = self.call("docid_to_name", serde_json::json!({"docid": docid}))?;
		serde_json::from_value(value).map_err(EngineError::from)
	}

	fn name_to_docid(&self, name: &str) -> Result<String> {
		let value = self.call("name_to_docid", serde_json::json!({"name": name}))?;
		serde_json::from_value(value).map_err(EngineError::from)
	}

	fn postings_list(&self, term: &str) -> Vec<(String, u32)> {
		self.call_or_default("postings_list", serde_json::json!({"term": term}), term)
	}

	fn query(&self, q: &str) -> Vec<(String, f64)> {
		self.call_or_default("query", serde_json::json!({"q": q}), q)
	}

	fn query_vec(&self, q: &TermVec) -> Vec<(String, f64)> {
		self.call_or_default("query_vec", serde_json::json!({"q": q}), "query_vec")
	}

	fn config(&self, key: &str) -> Result<Value> {
		self.call("config", serde_json::json!({"key": key}))
	}

	fn set_config(&mut self, key: &str, value: Value) -> Result<()> {
		self.call("set_config", serde_json::json!({"key": key, "value": value}))?;
		Ok(())
	}

	fn set_query_scorer(&mut self, scorer: ScorerArg) -> Result<()> {
		match scorer {
			ScorerArg::Name(name) => {
				self.call("set_query_scorer", serde_json::json!({"name": name}))?;
				Ok(())
			}
			ScorerArg::Instance(_) => Err(EngineError::ScorerNotTransportable(
				"an instance scorer cannot cross a remote boundary".to_string(),
			)),
		}
	}

	fn get_local_n(&self) -> u64 {
		self.call_or_default("get_local_n", Value::Null, "get_local_n")
	}

	fn get_local_df_map(&self) -> HashMap<String, u64> {
		self.call_or_default("get_local_df_map", Value::Null, "get_local_df_map")
	}

	fn get_name_to_docid_map(&self) -> HashMap<String, String> {
		self.call_or_default("get_name_to_docid_map", Value::Null, "get_name_to_docid_map")
	}

	fn set_global_n(&mut self, n: Option<u64>) {
		let _ = self.call("set_global_n", serde_json::json!({"n": n}));
	}

	fn set_global_df_map(&mut self, df_map: Option<HashMap<String, u64>>) {
		let _ = self.call("set_global_df_map", serde_json::json!({"df_map": df_map}));
	}
}
