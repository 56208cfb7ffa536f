//! Daedalus route compiler command line.
//!
//! Compiles controller descriptor files into handler and registration units.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tracing::{error, info};

use daedalus_build::{telemetry_config, BuildError, RouteBuild};
use daedalus_config::ConfigLoader;
use daedalus_telemetry::init_telemetry;

const DEFAULT_CONFIG_FILE: &str = "daedalus.toml";

/// Command-line arguments.
#[derive(Debug, Default)]
struct Args {
    /// Configuration file; `daedalus.toml` is used when present.
    config: Option<PathBuf>,
    /// Output directory override.
    output: Option<PathBuf>,
    /// Start from the development preset.
    dev: bool,
    /// Descriptor files or directories.
    inputs: Vec<PathBuf>,
}

impl Args {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Option<Self>> {
        let mut args = args.into_iter();
        let mut parsed = Self::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args.next().context("--config requires a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--output" | "-o" => {
                    let path = args.next().context("--output requires a path")?;
                    parsed.output = Some(PathBuf::from(path));
                }
                "--dev" => parsed.dev = true,
                "--help" | "-h" => {
                    print_help();
                    return Ok(None);
                }
                "--version" | "-V" => {
                    println!("daedalus-build {}", daedalus_build::VERSION);
                    return Ok(None);
                }
                other if other.starts_with('-') => {
                    bail!("unknown argument: {other}\nUse --help for usage information");
                }
                input => parsed.inputs.push(PathBuf::from(input)),
            }
        }

        if parsed.inputs.is_empty() {
            bail!("no descriptor files given\nUse --help for usage information");
        }
        Ok(Some(parsed))
    }
}

fn print_help() {
    println!(
        r"Daedalus - MVC route compiler

USAGE:
    daedalus-build [OPTIONS] <DESCRIPTORS>...

ARGS:
    <DESCRIPTORS>...       Descriptor JSON files, or directories of them

OPTIONS:
    -c, --config <PATH>    Configuration file (TOML or JSON, default: daedalus.toml)
    -o, --output <DIR>     Output directory (overrides output.dir)
        --dev              Start from the development preset
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    DAEDALUS__OUTPUT__DIR                      Output directory
    DAEDALUS__OUTPUT__INCREMENTAL              Skip unchanged unit files
    DAEDALUS__COMPILER__EXCLUDED_ATTRIBUTES    Comma-separated attribute names
    DAEDALUS__COMPILER__FAIL_FAST              Stop at the first failing controller
    DAEDALUS__LOGGING__LEVEL                   Log level or filter directive
    DAEDALUS__METRICS__OUTPUT_FILE             Prometheus text output file
"
    );
}

fn load_config(args: &Args) -> Result<daedalus_config::DaedalusConfig> {
    let mut loader = ConfigLoader::new().with_dotenv();
    if args.dev {
        loader = loader.with_development();
    }
    loader = match &args.config {
        Some(path) => loader
            .with_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => loader.with_optional_file(DEFAULT_CONFIG_FILE)?,
    };
    let mut config = loader.with_default_env().load()?;
    if let Some(output) = &args.output {
        config.output.dir.clone_from(output);
    }
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let registry = init_telemetry(&telemetry_config(&config))?;

    info!(
        version = daedalus_build::VERSION,
        inputs = args.inputs.len(),
        output = %config.output.dir.display(),
        "starting route compilation"
    );

    let result = RouteBuild::new(config).with_metrics(registry).run_files(&args.inputs);
    if let Err(BuildError::Failed { failures }) = &result {
        for (controller, failure) in failures {
            error!(controller = %controller, error = %failure, "compilation failed");
        }
    }
    let report = result?;
    println!(
        "{} controllers, {} units ({} written, {} unchanged, {} pruned) -> {}",
        report.controllers,
        report.units,
        report.written,
        report.unchanged,
        report.pruned.len(),
        report.manifest_path.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => return ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Args>> {
        Args::parse(args.iter().map(ToString::to_string))
    }

    #[test]
    fn test_parse_inputs_and_options() {
        let args = parse(&["-c", "build.toml", "--dev", "a.json", "-o", "out", "dir"])
            .unwrap()
            .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("build.toml")));
        assert_eq!(args.output, Some(PathBuf::from("out")));
        assert!(args.dev);
        assert_eq!(args.inputs, vec![PathBuf::from("a.json"), PathBuf::from("dir")]);
    }

    #[test]
    fn test_parse_rejects_unknown_flag() {
        assert!(parse(&["--fast", "a.json"]).is_err());
    }

    #[test]
    fn test_parse_requires_inputs() {
        assert!(parse(&["--dev"]).is_err());
    }

    #[test]
    fn test_parse_missing_option_value() {
        assert!(parse(&["a.json", "--config"]).is_err());
    }
}
