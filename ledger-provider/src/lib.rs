pub mod cbor;
pub mod config;
pub mod indexer;
pub mod model;
pub mod node_bridge;
pub mod poller;
pub mod provider;

pub use provider::Provider;
