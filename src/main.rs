//! vblk - drive a block-storage plugin from the command line
//!
//! Configures the `nbd` plugin from a YAML file, the environment and
//! `key=value` parameters, opens one handle and runs a single operation.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vblk_nbd::{NbdConfig, NbdPlugin};
use vblk_plugin::Plugin;

#[derive(Parser)]
#[command(name = "vblk")]
#[command(about = "Run block operations through the vblk nbd plugin")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "VBLK_NBD_CONFIG")]
    config: Option<PathBuf>,

    /// Plugin parameter as key=value (repeatable)
    #[arg(short = 'o', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Open the export read-only
    #[arg(short, long)]
    readonly: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show export size and capabilities
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read a range and hex dump it (or save it to a file)
    Read {
        #[arg(long, default_value = "0")]
        offset: u64,

        #[arg(short, long)]
        length: u32,

        /// Write raw bytes here instead of dumping
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Write the contents of a file at an offset
    Write {
        #[arg(long, default_value = "0")]
        offset: u64,

        #[arg(short, long)]
        input: PathBuf,
    },

    /// Zero a range
    Zero {
        #[arg(long, default_value = "0")]
        offset: u64,

        #[arg(short, long)]
        length: u32,

        /// Keep the range allocated
        #[arg(long)]
        no_trim: bool,
    },

    /// Discard a range
    Trim {
        #[arg(long, default_value = "0")]
        offset: u64,

        #[arg(short, long)]
        length: u32,
    },

    /// Flush the export
    Flush,

    /// Describe the accepted plugin parameters
    HelpParams,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = NbdConfig::load(cli.config.as_deref())?;
    let mut plugin = NbdPlugin::with_config(config);

    if let Commands::HelpParams = cli.command {
        println!("{}", plugin.config_help());
        return Ok(());
    }

    for param in &cli.params {
        let (key, value) = commands::parse_param(param)?;
        plugin.config(key, value)?;
    }
    plugin.config_complete()?;

    tracing::debug!(
        "{} {} (thread model {:?})",
        plugin.longname(),
        plugin.version(),
        plugin.thread_model()
    );

    let handle = plugin.open(cli.readonly)?;
    let result = commands::execute(handle.as_ref(), cli.command);
    handle.close();

    let output = result?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
