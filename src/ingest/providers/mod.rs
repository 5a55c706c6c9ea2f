// src/ingest/providers/mod.rs
pub mod fixture;
pub mod json_api;
pub mod rss;

pub use fixture::{FailingCollector, FixtureCollector};
pub use json_api::JsonApiCollector;
pub use rss::RssCollector;
