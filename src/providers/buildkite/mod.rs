mod client;
mod extract;
mod fetch;
mod timestamps;
mod types;

pub use client::BuildkiteClient;
pub use extract::{extract_build, extract_builds};
pub use fetch::{BuildSource, IncrementalFetcher};
