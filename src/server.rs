// ---------------------------------------------------------------------------
// JSON-RPC dispatcher + TCP server
// ---------------------------------------------------------------------------
//
// Dispatch-by-method-name against any `SimIndex`, one thread per connection,
// each holding the shared index behind an `Arc<Mutex<..>>` -- the
// concurrency envelope is what actually owns fine-grained locking; a bare
// `Mutex` here is the degenerate single-shard case used directly by tests
// and the simplest CLI mode.
// ---------------------------------------------------------------------------

use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::fetch::UrlFetcher;
use crate::protocol::{engine_error_body, JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND};
use crate::sim_index::{ScorerArg, SimIndex};

fn param<T: serde::de::DeserializeOwned>(params: &Value, key: &str) -> Result<T> {
	let raw = params
		.get(key)
		.ok_or_else(|| EngineError::Malformed(format!("missing param: {key}")))?;
	serde_json::from_value(raw.clone()).map_err(|e| EngineError::Malformed(format!("bad param {key}: {e}")))
}

/// Dispatch one already-decoded method call against `target`. Shared by the
/// TCP server and the in-process `LoopbackChannel` used in tests.
///
/// `fetcher` is used only for `index_urls`: the URL list is pushed over the
/// wire verbatim, so it is the receiving side's fetcher, never the caller's,
/// that does the work.
pub fn dispatch_method(target: &mut dyn SimIndex, method: &str, params: Value, fetcher: &Arc<dyn UrlFetcher>) -> Result<Value> {
	match method {
		"index_string_buffers" => {
			let items: Vec<(String, String)> = param(&params, "items")?;
			target.index_string_buffers(items)?;
			Ok(Value::Null)
		}
		"index_urls" => {
			let urls: Vec<String> = param(&params, "urls")?;
			target.index_urls(urls, Arc::clone(fetcher))?;
			Ok(Value::Null)
		}
		"del_docids" => {
			let docids: Vec<String> = param(&params, "docids")?;
			target.del_docids(docids)?;
			Ok(Value::Null)
		}
		"docid_to_name" => {
			let docid: String = param(&params, "docid")?;
			Ok(serde_json::json!(target.docid_to_name(&docid)?))
		}
		"name_to_docid" => {
			let name: String = param(&params, "name")?;
			Ok(serde_json::json!(target.name_to_docid(&name)?))
		}
		"postings_list" => {
			let term: String = param(&params, "term")?;
			Ok(serde_json::json!(target.postings_list(&term)))
		}
		"docids_with_terms" => {
			let terms: Vec<String> = param(&params, "terms")?;
			Ok(serde_json::json!(target.docids_with_terms(&terms)))
		}
		"docnames_with_terms" => {
			let terms: Vec<String> = param(&params, "terms")?;
			Ok(serde_json::json!(target.docnames_with_terms(&terms)?))
		}
		"query" => {
			let q: String = param(&params, "q")?;
			Ok(serde_json::json!(target.query(&q)))
		}
		"query_vec" => {
			let q: crate::term_vec::TermVec = param(&params, "q")?;
			Ok(serde_json::json!(target.query_vec(&q)))
		}
		"load_stoplist" => {
			let text: String = param(&params, "text")?;
			target.load_stoplist(&text)?;
			Ok(Value::Null)
		}
		"config" => {
			let key: String = param(&params, "key")?;
			target.config(&key)
		}
		"set_config" => {
			let key: String = param(&params, "key")?;
			let value: Value = param(&params, "value")?;
			target.set_config(&key, value)?;
			Ok(Value::Null)
		}
		"update_config" => {
			let updates: serde_json::Map<String, Value> = param(&params, "updates")?;
			target.update_config(updates)?;
			Ok(Value::Null)
		}
		"set_query_scorer" => {
			let name: String = param(&params, "name")?;
			target.set_query_scorer(ScorerArg::Name(name))?;
			Ok(Value::Null)
		}
		"get_local_n" => Ok(serde_json::json!(target.get_local_n())),
		"get_local_df_map" => Ok(serde_json::json!(target.get_local_df_map())),
		"get_name_to_docid_map" => Ok(serde_json::json!(target.get_name_to_docid_map())),
		"set_global_n" => {
			let n: Option<u64> = param(&params, "n")?;
			target.set_global_n(n);
			Ok(Value::Null)
		}
		"set_global_df_map" => {
			let df_map: Option<std::collections::HashMap<String, u64>> = param(&params, "df_map")?;
			target.set_global_df_map(df_map);
			Ok(Value::Null)
		}
		other => Err(EngineError::UnsupportedMethod(other.to_string())),
	}
}

/// Turn a decoded JSON-RPC request into a response, never panicking: every
/// engine failure and unknown method becomes a JSON-RPC error body.
pub fn handle_request(target: &mut dyn SimIndex, request: JsonRpcRequest, fetcher: &Arc<dyn UrlFetcher>) -> JsonRpcResponse {
	let id = request.id.clone().unwrap_or(Value::Null);
	match dispatch_method(target, &request.method, request.params, fetcher) {
		Ok(result) => JsonRpcResponse::ok(id, result),
		Err(EngineError::UnsupportedMethod(m)) => {
			JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown method: {m}"), None)
		}
		Err(EngineError::Malformed(m)) => JsonRpcResponse::err(id, INVALID_PARAMS, m, None),
		Err(e) => {
			let body = engine_error_body(&e);
			JsonRpcResponse::err(id, body.code, body.message, body.data)
		}
	}
}

fn serve_connection(stream: TcpStream, index: Arc<Mutex<Box<dyn SimIndex>>>, fetcher: Arc<dyn UrlFetcher>) {
	let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();
	let read_half = match stream.try_clone() {
		Ok(s) => s,
		Err(e) => {
			tracing::error!("failed to clone connection from {peer}: {e}");
			return;
		}
	};
	let mut reader = crate::transport::NdjsonReader::new(read_half);
	let mut writer = crate::transport::NdjsonWriter::new(stream);

	loop {
		let value = match reader.read_value() {
			Ok(Some(v)) => v,
			Ok(None) => {
				tracing::info!("connection from {peer} closed");
				return;
			}
			Err(e) => {
				tracing::warn!("malformed request from {peer}: {e}");
				return;
			}
		};
		let request: JsonRpcRequest = match serde_json::from_value(value) {
			Ok(r) => r,
			Err(e) => {
				let _ = writer.write_error(Value::Null, crate::protocol::PARSE_ERROR, e.to_string());
				continue;
			}
		};
		let is_notification = request.id.is_none();
		let response = {
			let mut guard = index.lock().expect("index mutex poisoned");
			handle_request(guard.as_mut(), request, &fetcher)
		};
		if is_notification {
			continue;
		}
		if writer.write_response(&response).is_err() {
			return;
		}
	}
}

/// Listen on `addr` and serve JSON-RPC requests against `index`, one thread
/// per connection, until the process is killed.
pub fn serve(addr: &str, index: Arc<Mutex<Box<dyn SimIndex>>>, fetcher: Arc<dyn UrlFetcher>) -> Result<()> {
	let listener = TcpListener::bind(addr)?;
	tracing::info!("listening on {addr}");
	for stream in listener.incoming() {
		let stream = stream?;
		let index = Arc::clone(&index);
		let fetcher = Arc::clone(&fetcher);
		std::thread::spawn(move || serve_connection(stream, index, fetcher));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::index::MemoryIndex;

	fn boxed_index() -> Box<dyn SimIndex> {
		Box::new(MemoryIndex::new())
	}

	fn no_fetcher() -> Arc<dyn UrlFetcher> {
		Arc::new(crate::fetch::UnimplementedFetcher::default())
	}

	#[test]
	fn dispatch_indexes_and_queries() {
		let mut target = boxed_index();
		let fetcher = no_fetcher();
		dispatch_method(
			target.as_mut(),
			"index_string_buffers",
			serde_json::json!({"items": [["doc1", "hello world"]]}),
			&fetcher,
		)
		.unwrap();
		dispatch_method(
			target.as_mut(),
			"set_query_scorer",
			serde_json::json!({"name": "simple_count"}),
			&fetcher,
		)
		.unwrap();
		let result = dispatch_method(target.as_mut(), "query", serde_json::json!({"q": "hello"}), &fetcher).unwrap();
		assert_eq!(result, serde_json::json!([["doc1", 1.0]]));
	}

	#[test]
	fn unknown_method_is_rejected() {
		let mut target = boxed_index();
		let err = dispatch_method(target.as_mut(), "delete_everything", Value::Null, &no_fetcher()).unwrap_err();
		assert_eq!(err.code(), "SIM_UNSUPPORTED_METHOD");
	}

	#[test]
	fn handle_request_maps_unsupported_method_to_method_not_found() {
		let mut target = boxed_index();
		let request = JsonRpcRequest {
			jsonrpc: "2.0".to_string(),
			method: "nope".to_string(),
			params: Value::Null,
			id: Some(Value::from(1)),
		};
		let response = handle_request(target.as_mut(), request, &no_fetcher());
		assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
	}

	#[test]
	fn missing_param_is_invalid_params() {
		let mut target = boxed_index();
		let request = JsonRpcRequest {
			jsonrpc: "2.0".to_string(),
			method: "docid_to_name".to_string(),
			params: Value::Null,
			id: Some(Value::from(1)),
		};
		let response = handle_request(target.as_mut(), request, &no_fetcher());
		assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
	}
}
