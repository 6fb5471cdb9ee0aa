pub mod aggregator;
pub mod analysis;
pub mod classifier;
pub mod config;
pub mod fake_history;
pub mod feed;
pub mod henrik;
pub mod http_cache;
pub mod http_client;
pub mod logging;
pub mod match_record;
pub mod report_export;
pub mod resolver;
pub mod service;
pub mod state;
pub mod store;
