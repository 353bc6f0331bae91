//! Configuration for the planet generator.
//!
//! Settings persist to disk as RON files. Supports CLI overrides via clap,
//! hot-reload detection, and forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, PlanetConfig, ShaderBackend, ShaderConfig};
pub use error::ConfigError;
