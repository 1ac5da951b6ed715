use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::debug;

use sphinx_make::config::DEFAULT_CONFIG_FILE;
use sphinx_make::{invoker, BuildConfig, BuildError, CommandLine, ConfigOverrides};

#[derive(Parser)]
#[command(name = "sphinx-make")]
#[command(about = "Build the HTML documentation with sphinx-build")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (defaults to sphinx-make.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Change to this directory before doing anything
    #[arg(short = 'C', long)]
    directory: Option<PathBuf>,

    /// Documentation tool command (overrides $SPHINXBUILD)
    #[arg(long, value_name = "CMD")]
    sphinx_build: Option<String>,

    /// Extra options for the tool (overrides $SPHINXOPTS)
    #[arg(long, value_name = "OPTS", allow_hyphen_values = true)]
    sphinx_opts: Option<String>,

    /// LaTeX paper size: a4 or letter (overrides $PAPER)
    #[arg(long)]
    paper: Option<String>,

    /// Directory for intermediate output (overrides $BUILDDIR)
    #[arg(long, value_name = "DIR")]
    build_dir: Option<PathBuf>,

    /// Print the commands instead of running them
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove the build directory
    Clean,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = match e.downcast_ref::<BuildError>() {
                // The tool has already reported its own diagnostics.
                Some(err) if err.is_tool_failure() => err.exit_code(),
                Some(err) => {
                    eprintln!("error: {:#}", e);
                    err.exit_code()
                }
                None => {
                    eprintln!("error: {:#}", e);
                    sphinx_make::error::USAGE_FAILURE_CODE
                }
            };
            ExitCode::from(code.clamp(1, 255) as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)
            .with_context(|| format!("Failed to change directory to {}", dir.display()))?;
    }

    let config_file = match cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("Configuration file {} does not exist", path.display());
            }
            path
        }
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };

    let overrides = ConfigOverrides {
        sphinx_build: cli.sphinx_build,
        sphinx_opts: cli.sphinx_opts,
        paper: cli.paper,
        build_dir: cli.build_dir,
    };
    let config = BuildConfig::load_with_overrides(Some(&config_file), &overrides)
        .context("Failed to load build configuration")?;
    debug!("Build configuration: {:?}", config);

    match cli.command {
        Some(Commands::Clean) => {
            if cli.dry_run {
                println!("rm -rf {}", config.build_dir.display());
                return Ok(());
            }
            invoker::clean(&config)
                .await
                .with_context(|| format!("Failed to clean {}", config.build_dir.display()))?;
        }
        None => {
            if cli.dry_run {
                println!("{}", CommandLine::from_config(&config)?);
                return Ok(());
            }
            let mut stdout = io::stdout();
            invoker::run_default_build(&config, &mut stdout).await?;
        }
    }

    Ok(())
}
