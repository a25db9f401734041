mod app;
mod config;
mod engine;
mod http;
mod sink;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use engine::EngineError;
pub use http::{HttpError, TransportError};
pub use sink::SinkError;
