use clap::{Parser, Subcommand};
use eventcount::cli::run::{ExecutionMode, RunOptions};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "eventcount")]
#[command(about = "Session-windowed event counting for application log streams", long_about = None)]
struct Cli {
    /// Runtime properties file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override a runtime property (repeatable)
    #[arg(long = "property", short = 'p', global = true, value_name = "KEY=VALUE")]
    properties: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the properties and run the counting job
    Run {
        /// Where the job runs; jobs only start in distributed mode
        #[arg(long, value_enum)]
        execution_mode: ExecutionMode,

        /// Stop at end of input instead of waiting for new records
        #[arg(long)]
        no_follow: bool,
    },
    /// Manage the properties file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventcount=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            execution_mode,
            no_follow,
        } => {
            let options = RunOptions {
                execution_mode,
                follow: !no_follow,
            };
            eventcount::cli::run::run(cli.config, &cli.properties, options).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => {
                eventcount::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                eventcount::cli::config::validate(cli.config, &cli.properties).await?;
            }
        },
    }

    Ok(())
}
