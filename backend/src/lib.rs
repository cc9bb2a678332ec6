pub mod aggregator;
pub mod airdrops;
pub mod api;
pub mod cache;
pub mod config;
pub mod feeds;
pub mod http;
pub mod providers;
pub mod types;

pub use aggregator::Aggregator;
pub use config::HubConfig;
pub use http::{FetchError, HttpClient};
