pub mod config;
pub mod duration;
pub mod error;
pub mod http;
pub mod instrumentation;

pub use duration::ConfigDuration;
pub use error::{Context, ErrorKind, ProviderError, ProviderResult};
