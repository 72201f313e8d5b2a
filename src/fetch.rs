// ---------------------------------------------------------------------------
// UrlFetcher -- external collaborator interface for URL fetching
// ---------------------------------------------------------------------------
//
// URL fetching and HTML cleaning are explicitly out of scope; we only need
// the interface point so `index_urls` has something to call. The default
// fetcher fails every URL (no real network client wired up) so the
// operation still exists and is exercised by tests with a fake fetcher,
// matching the `doc_reader.get_text_file` seam in the original source.
// ---------------------------------------------------------------------------

use std::time::Duration;

/// Fetches the cleaned text body of a URL, with a finite timeout.
pub trait UrlFetcher: Send + Sync {
	fn fetch(&self, url: &str) -> std::io::Result<String>;
}

/// The default fetcher: every URL fails immediately. Swap in a real HTTP +
/// HTML-cleaning client to actually index web pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedFetcher {
	pub timeout: Option<Duration>,
}

impl UrlFetcher for UnimplementedFetcher {
	fn fetch(&self, url: &str) -> std::io::Result<String> {
		Err(std::io::Error::new(
			std::io::ErrorKind::Unsupported,
			format!("no URL fetcher configured for {url}"),
		))
	}
}
