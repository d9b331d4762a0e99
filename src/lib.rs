pub mod api_sink;
pub mod config;
#[cfg(feature = "db")]
pub mod db;
pub mod error;
pub mod geocode;
pub mod loader;
pub mod logging;
pub mod mapping;
pub mod normalize;
pub mod pipeline;
pub mod sink;
pub mod types;
