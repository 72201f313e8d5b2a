// ---------------------------------------------------------------------------
// NDJSON transport -- one JSON value per line
// ---------------------------------------------------------------------------
//
// Generalised from stdio-only to any `Read`/`Write` pair so the same
// newline-delimited JSON framing works over a TCP stream.
// ---------------------------------------------------------------------------

use std::io::{BufRead, BufReader, Read, Write};

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::{JsonRpcErrorBody, JsonRpcNotification, JsonRpcResponse};

pub struct NdjsonReader<R: Read> {
	lines: std::io::Lines<BufReader<R>>,
}

impl<R: Read> NdjsonReader<R> {
	pub fn new(inner: R) -> Self {
		Self {
			lines: BufReader::new(inner).lines(),
		}
	}

	/// Read and parse the next line as a JSON value. `Ok(None)` at EOF.
	pub fn read_value(&mut self) -> Result<Option<Value>> {
		loop {
			let line = match self.lines.next() {
				Some(line) => line?,
				None => return Ok(None),
			};
			if line.trim().is_empty() {
				continue;
			}
			return Ok(Some(serde_json::from_str(&line)?));
		}
	}
}

pub struct NdjsonWriter<W: Write> {
	inner: W,
}

impl<W: Write> NdjsonWriter<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}

	pub fn write_line<T: Serialize>(&mut self, value: &T) -> Result<()> {
		let mut line = serde_json::to_string(value)?;
		line.push('\n');
		self.inner.write_all(line.as_bytes())?;
		self.inner.flush()?;
		Ok(())
	}

	pub fn write_response(&mut self, response: &JsonRpcResponse) -> Result<()> {
		self.write_line(response)
	}

	pub fn write_error(&mut self, id: Value, code: i64, message: String) -> Result<()> {
		self.write_line(&JsonRpcResponse {
			jsonrpc: "2.0".to_string(),
			result: None,
			error: Some(JsonRpcErrorBody { code, message, data: None }),
			id,
		})
	}

	pub fn write_notification(&mut self, method: &str, params: Value) -> Result<()> {
		self.write_line(&JsonRpcNotification {
			jsonrpc: "2.0".to_string(),
			method: method.to_string(),
			params,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_a_line() {
		let mut buf: Vec<u8> = Vec::new();
		{
			let mut writer = NdjsonWriter::new(&mut buf);
			writer
				.write_response(&JsonRpcResponse::ok(Value::from(1), serde_json::json!({"ok": true})))
				.unwrap();
		}
		let mut reader = NdjsonReader::new(buf.as_slice());
		let value = reader.read_value().unwrap().unwrap();
		assert_eq!(value["result"]["ok"], Value::from(true));
		assert!(reader.read_value().unwrap().is_none());
	}

	#[test]
	fn skips_blank_lines() {
		let mut reader = NdjsonReader::new("\n\n{\"x\":1}\n".as_bytes());
		let value = reader.read_value().unwrap().unwrap();
		assert_eq!(value["x"], Value::from(1));
	}
}
