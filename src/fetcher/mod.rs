pub mod client;
pub mod decode;
pub mod errors;
pub mod types;
pub mod url_guard;

pub use client::{ContentFetcher, ContentSource, FetcherConfig};
pub use errors::FetchError;
pub use types::PageResponse;
pub use url_guard::{ensure_public_host, normalize_url};
