use clap::{Parser, Subcommand};
use snafu::{ResultExt, Whatever};
use tracing_subscriber::EnvFilter;

use vesta_runtime::{ContextConfig, global_context};

#[derive(Parser)]
#[command(name = "vesta-query", about = "Inspect and probe accelerator devices", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show diagnostic information for a device
    Query {
        /// Device ordinal to query
        #[arg(long)]
        device: usize,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Check whether a device can be activated
    Check {
        /// Device ordinal to probe
        #[arg(long)]
        device: usize,
    },

    /// Find the first usable device at or after an ordinal
    Find {
        /// First ordinal to probe
        #[arg(long, default_value_t = 0)]
        start: usize,
    },
}

#[snafu::report]
fn main() -> Result<(), Whatever> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ContextConfig::from_env().whatever_context("invalid environment configuration")?;
    let mut context = global_context();
    context.configure(&config).whatever_context("cannot apply configuration")?;

    match cli.command {
        Command::Query { device, json } => {
            tracing::info!(device, "querying device");
            context.try_set_device(device).with_whatever_context(|_| format!("cannot activate device {device}"))?;
            let properties = context.device_query().whatever_context("device query failed")?;
            if json {
                let rendered = serde_json::to_string_pretty(&properties).whatever_context("cannot render JSON")?;
                println!("{rendered}");
            } else {
                println!("{properties}");
            }
        }
        Command::Check { device } => {
            let available = context.check_device(device);
            println!("device {device}: {}", if available { "available" } else { "unavailable" });
            if !available {
                std::process::exit(1);
            }
        }
        Command::Find { start } => match context.find_device(start) {
            Some(ordinal) => println!("{ordinal}"),
            None => {
                println!("no usable device at or after {start}");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
