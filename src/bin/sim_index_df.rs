// ---------------------------------------------------------------------------
// sim_index_df -- compute a document-frequency file from a batch of documents
// ---------------------------------------------------------------------------

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use clap::Parser;

use sim_index_engine::freq_tools;

#[derive(Parser, Debug)]
#[command(name = "sim_index_df", about = "Compute a document-frequency file for a batch of documents")]
struct Cli {
	/// Document paths to include directly.
	names: Vec<PathBuf>,

	/// A file of newline-separated document paths to include additionally.
	#[arg(long = "list")]
	list: Option<PathBuf>,

	/// Where to write the df file; stdout if omitted.
	#[arg(long = "output")]
	output: Option<PathBuf>,
}

fn main() -> sim_index_engine::Result<()> {
	tracing_subscriber::fmt().with_writer(io::stderr).init();
	let cli = Cli::parse();

	let mut paths: Vec<PathBuf> = cli.names;
	if let Some(list_path) = &cli.list {
		for name in freq_tools::read_name_list(list_path)? {
			paths.push(PathBuf::from(name));
		}
	}

	let named_paths: Vec<(String, PathBuf)> = paths
		.into_iter()
		.map(|p| (p.to_string_lossy().into_owned(), p))
		.collect();

	tracing::info!("computing document frequencies for {} documents", named_paths.len());
	let df = freq_tools::compute_df(named_paths)?;

	match cli.output {
		Some(path) => {
			let writer = BufWriter::new(File::create(path)?);
			freq_tools::write_df_file(writer, &df)?;
		}
		None => {
			freq_tools::write_df_file(io::stdout().lock(), &df)?;
		}
	}

	Ok(())
}
