//! `planetgen`: compiles a planet document into its generation program.
//!
//! Loads the config, applies CLI overrides, then either emits the generated
//! fragment source (`--emit`) or links it with the configured backend and
//! prints a summary of the resulting program.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use nebula_config::{CliArgs, Config, ShaderBackend};
use nebula_planet::{FsReader, PlanetGenData, PlanetLoadError, PlanetLoader};
use nebula_render::{GpuInitError, HeadlessGpu, NagaLinker, ProgramLinker, WgpuLinker};
use nebula_terrain::{PlanetDescriptor, generate_descriptor};
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Load(#[from] PlanetLoadError),

    #[error("could not create a GPU device for the wgpu backend")]
    Gpu(#[from] GpuInitError),

    #[error("failed to write '{}'", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Formats an error with every source in its chain, one per line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    message
}

/// Planet named on the command line, else the configured default.
fn selected_planet(args: &CliArgs, config: &Config) -> Option<PathBuf> {
    args.planet
        .clone()
        .or_else(|| config.planet.default_planet.clone())
}

fn reader_for(config: &Config) -> FsReader {
    match &config.planet.data_dir {
        Some(root) => FsReader::with_root(root),
        None => FsReader::new(),
    }
}

fn emit(
    loader: &PlanetLoader<FsReader, NagaLinker>,
    planet: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let source = match planet {
        Some(path) => loader.generate_source(path)?,
        None => generate_descriptor(&PlanetDescriptor::default()),
    };

    match output {
        Some(path) => std::fs::write(path, &source).map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        })?,
        None => std::io::stdout()
            .write_all(source.as_bytes())
            .map_err(|source| CliError::Write {
                path: PathBuf::from("<stdout>"),
                source,
            })?,
    }
    Ok(())
}

fn print_summary(data: &PlanetGenData) {
    let program = &data.program;
    println!("program: {}", program.label());
    for output in program.outputs() {
        println!("  output   @location({}) {}", output.location, output.name);
    }
    for attribute in program.attributes() {
        println!("  attribute @location({}) {}", attribute.location, attribute.name);
    }
    for uniform in program.uniforms() {
        println!(
            "  uniform  @group({}) @binding({}) {}",
            uniform.group, uniform.binding, uniform.name
        );
    }
    println!(
        "  pipeline: {}",
        if program.pipeline().is_some() {
            "created"
        } else {
            "none (offline validation)"
        }
    );
}

fn link<L: ProgramLinker>(
    loader: PlanetLoader<FsReader, L>,
    planet: Option<&Path>,
) -> Result<(), CliError> {
    match planet {
        Some(path) => print_summary(&loader.load_planet(path)?),
        None => {
            info!("No planet given, linking the default program");
            print_summary(&*loader.default_gen_data()?);
        }
    }
    Ok(())
}

fn run(args: &CliArgs, config: &Config) -> Result<(), CliError> {
    let planet = selected_planet(args, config);
    let reader = reader_for(config);
    let dump = config.shader.dump_source_on_failure;

    if args.emit {
        let loader = PlanetLoader::new(reader, NagaLinker::new());
        return emit(&loader, planet.as_deref(), args.output.as_deref());
    }

    match config.shader.backend {
        ShaderBackend::Naga => link(
            PlanetLoader::new(reader, NagaLinker::new()).with_dump_source_on_failure(dump),
            planet.as_deref(),
        ),
        ShaderBackend::Wgpu => {
            let gpu = HeadlessGpu::new_blocking()?;
            link(
                PlanetLoader::new(reader, WgpuLinker::new(gpu.device))
                    .with_dump_source_on_failure(dump),
                planet.as_deref(),
            )
        }
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args
        .config
        .clone()
        .or_else(Config::default_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    nebula_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", error_chain(&err));
            ExitCode::FAILURE
        }
    }
}
