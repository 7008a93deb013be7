//! Configuration module

mod environment;

pub use environment::ConfigError;
pub use environment::EnvironmentConfig;
