pub mod cache;
pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod generator;
pub mod jobs;
pub mod personas;
pub mod transform;
pub mod usage;
