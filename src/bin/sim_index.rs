// ---------------------------------------------------------------------------
// sim_index -- the JSON-RPC search server
// ---------------------------------------------------------------------------

use std::io;
use std::sync::{Arc, Mutex};

use clap::Parser;

use sim_index_engine::collection::Collection;
use sim_index_engine::envelope::ConcurrencyEnvelope;
use sim_index_engine::fetch::UnimplementedFetcher;
use sim_index_engine::index::MemoryIndex;
use sim_index_engine::remote::{RemoteProxy, TcpMethodChannel};
use sim_index_engine::server;
use sim_index_engine::sim_index::SimIndex;

#[derive(Parser, Debug)]
#[command(name = "sim_index", about = "Similarity search server")]
struct Cli {
	/// TCP port to listen on.
	#[arg(long, default_value_t = 9001)]
	port: u16,

	/// Remote shard addresses (host:port). When present, this server fronts
	/// a collection of remote proxies instead of a single local index.
	#[arg(long = "remote_shards", num_args = 0..)]
	remote_shards: Vec<String>,

	/// Mark this server's collection as non-root, suppressing stats
	/// broadcast (its parent drives broadcast from the true root instead).
	#[arg(long)]
	noroot: bool,
}

fn build_index(cli: &Cli) -> sim_index_engine::Result<Box<dyn SimIndex>> {
	if cli.remote_shards.is_empty() {
		return Ok(Box::new(MemoryIndex::new()));
	}

	let mut shards: Vec<Box<dyn SimIndex>> = Vec::with_capacity(cli.remote_shards.len());
	for addr in &cli.remote_shards {
		let channel = TcpMethodChannel::connect(addr)?;
		shards.push(Box::new(RemoteProxy::new(channel)));
	}
	let mut collection = Collection::new(shards, process_salt());
	collection.set_root(!cli.noroot);
	Ok(Box::new(collection))
}

/// One salt per process lifetime. Derived from the process id plus a fixed
/// constant rather than a clock read, since wall-clock time is unavailable
/// in this crate's deterministic helpers.
fn process_salt() -> u64 {
	std::process::id() as u64 ^ 0x9E3779B97F4A7C15
}

fn main() -> sim_index_engine::Result<()> {
	tracing_subscriber::fmt().with_writer(io::stderr).init();
	let cli = Cli::parse();

	let index = build_index(&cli)?;
	let envelope: Box<dyn SimIndex> = Box::new(ConcurrencyEnvelope::new(index));
	let shared: Arc<Mutex<Box<dyn SimIndex>>> = Arc::new(Mutex::new(envelope));
	let fetcher: Arc<dyn sim_index_engine::fetch::UrlFetcher> = Arc::new(UnimplementedFetcher::default());

	let addr = format!("0.0.0.0:{}", cli.port);
	server::serve(&addr, shared, fetcher)
}
