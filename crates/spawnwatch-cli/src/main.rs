//! spawnwatch CLI - inspect the host and replay identity transitions

mod scenario;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use spawnwatch::{FilterMechanism, Variant};

use crate::scenario::Scenario;

#[derive(Parser)]
#[command(name = "spawnwatch")]
#[command(author, version, about = "Identity-transition hook for spawner children")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the host kernel version and the filter mechanism it supports
    Check,

    /// Replay a JSON scenario of transitions and print one outcome per line
    Simulate {
        /// Scenario file
        scenario: PathBuf,

        /// Override the scenario's coordinator variant
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,

        /// Use the legacy disable mechanism regardless of the scenario
        #[arg(long)]
        legacy: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    Basic,
    Extended,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Basic => Variant::Basic,
            VariantArg::Extended => Variant::Extended,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spawnwatch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            let version = spawnwatch_sys::host_kernel_version()?;
            println!("Kernel: {version}");
            println!("Filter mechanism: {:?}", FilterMechanism::for_kernel(version));
        }

        Commands::Simulate {
            scenario,
            variant,
            legacy,
        } => {
            let mut scenario = Scenario::from_path(&scenario)?;
            if let Some(variant) = variant {
                scenario.config.variant = variant.into();
            }
            if legacy {
                scenario.config.mechanism = FilterMechanism::Disable;
            }

            for report in scenario.run()? {
                println!("{}", serde_json::to_string(&report)?);
            }
        }
    }

    Ok(())
}
