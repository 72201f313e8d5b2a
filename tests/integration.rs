// ---------------------------------------------------------------------------
// End-to-end scenarios against the running server
// ---------------------------------------------------------------------------
//
// Spawns a server process and drives it over NDJSON on a TCP socket,
// since this server listens on `--port` rather than talking over
// child-process stdio.
// ---------------------------------------------------------------------------

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

struct ServerHandle {
	child: Child,
	addr: String,
}

impl Drop for ServerHandle {
	fn drop(&mut self) {
		let _ = self.child.kill();
		let _ = self.child.wait();
	}
}

fn free_port() -> u16 {
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	listener.local_addr().unwrap().port()
}

fn spawn_server(extra_args: &[&str]) -> ServerHandle {
	let port = free_port();
	let mut cmd = Command::new(env!("CARGO_BIN_EXE_sim_index"));
	cmd.arg("--port").arg(port.to_string());
	cmd.args(extra_args);
	cmd.stdout(Stdio::null()).stderr(Stdio::null());
	let child = cmd.spawn().expect("failed to spawn sim_index");

	let addr = format!("127.0.0.1:{port}");
	for _ in 0..100 {
		if TcpStream::connect(&addr).is_ok() {
			return ServerHandle { child, addr };
		}
		std::thread::sleep(Duration::from_millis(50));
	}
	panic!("server never started listening on {addr}");
}

struct Client {
	stream: TcpStream,
	reader: BufReader<TcpStream>,
	next_id: u64,
}

impl Client {
	fn connect(addr: &str) -> Self {
		let stream = TcpStream::connect(addr).unwrap();
		let reader = BufReader::new(stream.try_clone().unwrap());
		Self { stream, reader, next_id: 0 }
	}

	fn call(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
		let id = self.next_id;
		self.next_id += 1;
		let request = serde_json::json!({"jsonrpc": "2.0", "method": method, "params": params, "id": id});
		let mut line = serde_json::to_string(&request).unwrap();
		line.push('\n');
		self.stream.write_all(line.as_bytes()).unwrap();

		let mut response_line = String::new();
		self.reader.read_line(&mut response_line).unwrap();
		let response: serde_json::Value = serde_json::from_str(&response_line).unwrap();
		assert!(response.get("error").is_none(), "rpc error: {response}");
		response["result"].clone()
	}
}

fn index_sample_docs(client: &mut Client) {
	client.call(
		"set_config",
		serde_json::json!({"key": "stoplist", "value": ["stopword1", "stopword2"]}),
	);
	client.call(
		"index_string_buffers",
		serde_json::json!({"items": [
			["doc1", "hello there world hello stopword1"],
			["doc2", "hello world stopword2"],
			["doc3", "hello there bob"],
		]}),
	);
}

#[test]
fn postings_list_matches_worked_example() {
	let server = spawn_server(&[]);
	let mut client = Client::connect(&server.addr);
	index_sample_docs(&mut client);

	let postings = client.call("postings_list", serde_json::json!({"term": "hello"}));
	assert_eq!(postings.as_array().unwrap().len(), 3);

	let stop_postings = client.call("postings_list", serde_json::json!({"term": "stopword1"}));
	assert!(stop_postings.as_array().unwrap().is_empty());
}

#[test]
fn docnames_with_terms_matches_worked_example() {
	let server = spawn_server(&[]);
	let mut client = Client::connect(&server.addr);
	index_sample_docs(&mut client);

	let mut names = client
		.call("docnames_with_terms", serde_json::json!({"terms": ["hello", "there"]}))
		.as_array()
		.unwrap()
		.iter()
		.map(|v| v.as_str().unwrap().to_string())
		.collect::<Vec<_>>();
	names.sort();
	assert_eq!(names, vec!["doc1".to_string(), "doc3".to_string()]);
}

#[test]
fn simple_count_query_matches_worked_example() {
	let server = spawn_server(&[]);
	let mut client = Client::connect(&server.addr);
	index_sample_docs(&mut client);
	client.call("set_query_scorer", serde_json::json!({"name": "simple_count"}));

	let hits = client.call("query", serde_json::json!({"q": "hello world"}));
	let map: std::collections::HashMap<String, f64> = hits
		.as_array()
		.unwrap()
		.iter()
		.map(|pair| (pair[0].as_str().unwrap().to_string(), pair[1].as_f64().unwrap()))
		.collect();
	assert_eq!(map.get("doc1"), Some(&3.0));
	assert_eq!(map.get("doc2"), Some(&2.0));
	assert_eq!(map.get("doc3"), Some(&1.0));
}

#[test]
fn delete_after_insert_restores_prior_answers() {
	let server = spawn_server(&[]);
	let mut client = Client::connect(&server.addr);
	index_sample_docs(&mut client);
	client.call("set_query_scorer", serde_json::json!({"name": "simple_count"}));

	client.call(
		"index_string_buffers",
		serde_json::json!({"items": [["extra", "hello world"]]}),
	);
	let extra_docid = client.call("name_to_docid", serde_json::json!({"name": "extra"}));
	client.call("del_docids", serde_json::json!({"docids": [extra_docid]}));

	let hits = client.call("query", serde_json::json!({"q": "hello world"}));
	let map: std::collections::HashMap<String, f64> = hits
		.as_array()
		.unwrap()
		.iter()
		.map(|pair| (pair[0].as_str().unwrap().to_string(), pair[1].as_f64().unwrap()))
		.collect();
	assert_eq!(map.get("doc1"), Some(&3.0));
	assert_eq!(map.get("doc2"), Some(&2.0));
	assert_eq!(map.get("doc3"), Some(&1.0));
}

#[test]
fn unknown_method_is_reported_as_method_not_found() {
	let server = spawn_server(&[]);
	let mut client = Client::connect(&server.addr);
	let request = serde_json::json!({"jsonrpc": "2.0", "method": "delete_everything", "params": {}, "id": 0});
	let mut line = serde_json::to_string(&request).unwrap();
	line.push('\n');
	client.stream.write_all(line.as_bytes()).unwrap();
	let mut response_line = String::new();
	client.reader.read_line(&mut response_line).unwrap();
	let response: serde_json::Value = serde_json::from_str(&response_line).unwrap();
	assert_eq!(response["error"]["code"], serde_json::json!(-32601));
}

#[test]
fn sharded_collection_of_remote_shards_matches_single_leaf_scenario() {
	let shard0 = spawn_server(&[]);
	let shard1 = spawn_server(&[]);
	let root = spawn_server(&["--remote_shards", &shard0.addr, &shard1.addr]);

	let mut client = Client::connect(&root.addr);
	index_sample_docs(&mut client);
	client.call("set_query_scorer", serde_json::json!({"name": "simple_count"}));

	let postings = client.call("postings_list", serde_json::json!({"term": "hello"}));
	let entries = postings.as_array().unwrap();
	assert_eq!(entries.len(), 3);
	for entry in entries {
		let docid = entry[0].as_str().unwrap();
		assert!(docid.contains('-'), "expected compound docid, got {docid}");
	}

	let hits = client.call("query", serde_json::json!({"q": "hello world"}));
	assert_eq!(hits.as_array().unwrap().len(), 3);
}
