//! snda - command-line client for SNDA storage

mod commands;
mod config;
mod progress;
mod storage;
mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use commands::cp::CpOptions;
use commands::rm::RmOptions;
use commands::CommandContext;
use config::Profile;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "snda")]
#[command(version = snda_core::VERSION)]
#[command(about = "Command-line client for SNDA storage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Profile from ~/.snda/config.toml
    #[arg(long, global = true, env = "SNDA_PROFILE")]
    profile: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SNDA_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Parts transferred at once, overrides the profile
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List buckets, or objects under s3://bucket[/prefix]
    Ls {
        path: Option<String>,
        /// Show dates and sizes
        #[arg(short, long)]
        long: bool,
        #[arg(short = 'H', long)]
        human_readable: bool,
        /// Do not group keys by "/"
        #[arg(short, long)]
        recursive: bool,
    },

    /// Make a bucket
    Mb { bucket: String },

    /// Remove a bucket
    Rb {
        bucket: String,
        /// Delete every object first
        #[arg(long)]
        force: bool,
    },

    /// Upload a file to s3://bucket/key or download one from it
    Cp {
        source: String,
        destination: String,
        #[arg(long)]
        no_progress: bool,
        #[arg(long)]
        dryrun: bool,
    },

    /// Remove an object, or everything under a prefix with --recursive
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,
        #[arg(long)]
        dryrun: bool,
    },

    /// Print a pre-signed URL for an object
    Presign {
        path: String,
        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        expires_in: u64,
        #[arg(long, default_value = "GET")]
        method: String,
    },

    /// Show or change profile settings
    Configure {
        #[command(subcommand)]
        action: Option<ConfigureAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigureAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut profile = Profile::load(cli.profile.as_deref())?;
    if let Some(concurrency) = cli.concurrency {
        profile.concurrency = concurrency;
    }

    let ctx = CommandContext {
        profile,
        profile_name: cli.profile,
        output_format: cli.output,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Ls {
            path,
            long,
            human_readable,
            recursive,
        } => commands::ls::execute(&ctx, path.as_deref(), long, human_readable, recursive).await,
        Commands::Mb { bucket } => commands::mb::execute(&ctx, &bucket).await,
        Commands::Rb { bucket, force } => commands::rb::execute(&ctx, &bucket, force).await,
        Commands::Cp {
            source,
            destination,
            no_progress,
            dryrun,
        } => {
            let opts = CpOptions {
                show_progress: !no_progress,
                dryrun,
            };
            commands::cp::execute(&ctx, &source, &destination, opts).await
        }
        Commands::Rm {
            path,
            recursive,
            force,
            dryrun,
        } => {
            let opts = RmOptions {
                recursive,
                force,
                dryrun,
            };
            commands::rm::execute(&ctx, &path, opts).await
        }
        Commands::Presign {
            path,
            expires_in,
            method,
        } => commands::presign::execute(&ctx, &path, expires_in, &method),
        Commands::Configure { action } => commands::configure::execute(&ctx, action),
    }
}
