use thiserror::Error;

/// Every failure mode the engine surfaces to a caller.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("unknown document name: {0}")]
	UnknownName(String),
	#[error("unknown docid: {0}")]
	UnknownDocid(String),
	#[error("unknown configuration key: {0}")]
	UnknownConfigKey(String),
	#[error("unsupported method: {0}")]
	UnsupportedMethod(String),
	#[error("instance scorers cannot cross a remote boundary: {0}")]
	ScorerNotTransportable(String),
	#[error("storage-backed maps only support get/put re-assignment: {0}")]
	InPlaceMutationUnsupported(String),
	#[error("malformed input: {0}")]
	Malformed(String),
	#[error("fetch failed for {url}: {source}")]
	Fetch {
		url: String,
		#[source]
		source: std::io::Error,
	},
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("serialization error: {0}")]
	Json(#[from] serde_json::Error),
	#[error("snapshot corrupted: {0}")]
	Corruption(String),
	#[error("shard {shard} failed during reconciliation: {source}")]
	PartialFailure {
		shard: usize,
		#[source]
		source: Box<EngineError>,
	},
}

impl EngineError {
	/// Short machine-readable tag, used in JSON-RPC error payloads.
	pub fn code(&self) -> &'static str {
		match self {
			Self::UnknownName(_) => "SIM_UNKNOWN_NAME",
			Self::UnknownDocid(_) => "SIM_UNKNOWN_DOCID",
			Self::UnknownConfigKey(_) => "SIM_UNKNOWN_CONFIG_KEY",
			Self::UnsupportedMethod(_) => "SIM_UNSUPPORTED_METHOD",
			Self::ScorerNotTransportable(_) => "SIM_SCORER_NOT_TRANSPORTABLE",
			Self::InPlaceMutationUnsupported(_) => "SIM_INPLACE_MUTATION",
			Self::Malformed(_) => "SIM_MALFORMED",
			Self::Fetch { .. } => "SIM_FETCH",
			Self::Io(_) => "SIM_IO",
			Self::Json(_) => "SIM_JSON",
			Self::Corruption(_) => "SIM_CORRUPT",
			Self::PartialFailure { .. } => "SIM_PARTIAL_FAILURE",
		}
	}

	pub fn to_json_rpc_data(&self) -> serde_json::Value {
		serde_json::json!({
			"simCode": self.code(),
			"message": self.to_string(),
		})
	}
}

pub type Result<T> = std::result::Result<T, EngineError>;
