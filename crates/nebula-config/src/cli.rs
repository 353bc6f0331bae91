//! Command-line argument parsing for the planet generator.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, ShaderBackend};

/// Planet generator command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(
    name = "planetgen",
    about = "Compile planet descriptors into generation shader programs"
)]
pub struct CliArgs {
    /// Planet document to load. Falls back to `planet.default_planet`, then the
    /// built-in default program.
    pub planet: Option<PathBuf>,

    /// Root directory for relative planet paths.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Shader backend (naga, wgpu).
    #[arg(long)]
    pub backend: Option<ShaderBackend>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the generated fragment source instead of linking.
    #[arg(long)]
    pub emit: bool,

    /// Write emitted source to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref dir) = args.data_dir {
            self.planet.data_dir = Some(dir.clone());
        }
        if let Some(backend) = args.backend {
            self.shader.backend = backend;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
