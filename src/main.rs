use anyhow::Context;
use clap::{Parser, Subcommand};
use recipe_runner::api::{self, SubmitOptions};
use recipe_runner::app::{handle_fatal_error, init_logging, AppConfig};
use recipe_runner::dataone::{DataOneResolver, DatasetResolver};
use recipe_runner::lifecycle::{LifecycleController, PollOptions};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Run data-transformation recipes on a workflow engine
#[derive(Parser)]
#[command(name = "recipe-runner", version)]
#[command(about = "Compile recipes into workflows and run them", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Engine configuration file (TOML); environment variables override it
    #[arg(long, value_name = "FILE", global = true)]
    engine_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a recipe for execution
    Submit {
        /// Directory containing meta.yml
        recipe_dir: PathBuf,

        /// Wait for the workflow to finish
        #[arg(long)]
        wait: bool,

        /// Replace data already published for this recipe
        #[arg(long)]
        overwrite: bool,

        /// Time between status checks
        #[arg(
            long,
            default_value = "5s",
            value_parser = humantime_serde::re::humantime::parse_duration
        )]
        poll_interval: Duration,

        /// Give up waiting after this long
        #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
        timeout: Option<Duration>,
    },
    /// Show the phase of a submitted workflow
    Status {
        /// Workflow name returned by `submit`
        execution_name: String,
    },
    /// Check that a recipe loads and compiles
    Validate {
        recipe_dir: PathBuf,
    },
    /// Validate every recipe under a directory
    ValidateAll {
        recipes_dir: PathBuf,
    },
    /// Print the workflow manifest a submission would send
    Render {
        recipe_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = AppConfig::new(cli.verbose).with_engine_config(cli.engine_config.clone());
    init_logging(&config);

    if let Err(e) = run(cli.command, &config).await {
        handle_fatal_error(e, config.verbose);
    }
}

async fn run(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Submit {
            recipe_dir,
            wait,
            overwrite,
            poll_interval,
            timeout,
        } => {
            let controller = LifecycleController::argo(config.engine_config()?)?;
            let mut poll = PollOptions::every(poll_interval);
            if let Some(timeout) = timeout {
                poll = poll.with_deadline(timeout);
            }
            let options = SubmitOptions {
                wait,
                overwrite,
                poll,
            };
            let resolver = dataset_resolver();
            let name = api::submit_recipe(
                &recipe_dir,
                &options,
                &controller,
                resolver.as_ref().map(as_dyn),
            )
            .await?;
            println!("{}", name);
        }
        Commands::Status { execution_name } => {
            let controller = LifecycleController::argo(config.engine_config()?)?;
            let phase = api::check_status(&execution_name, &controller).await?;
            println!("{}: {}", execution_name, phase);
        }
        Commands::Validate { recipe_dir } => {
            let recipe = api::validate_recipe(&recipe_dir)?;
            println!("Recipe '{}' ({}) is valid", recipe.name(), recipe.id());
        }
        Commands::ValidateAll { recipes_dir } => {
            let report = api::validate_all(&recipes_dir)?;
            for dir in &report.valid {
                println!("ok      {}", dir.display());
            }
            for (dir, reason) in &report.invalid {
                println!("invalid {}: {}", dir.display(), reason);
            }
            if !report.is_ok() {
                anyhow::bail!(
                    "{} of {} recipes are invalid",
                    report.invalid.len(),
                    report.invalid.len() + report.valid.len()
                );
            }
        }
        Commands::Render { recipe_dir } => {
            let engine_config = config.engine_config()?;
            let resolver = dataset_resolver();
            let manifest =
                api::render_recipe(&recipe_dir, &engine_config, resolver.as_ref().map(as_dyn))
                    .await?;
            let rendered = serde_json::to_string_pretty(&manifest)
                .context("Failed to serialize workflow manifest")?;
            println!("{}", rendered);
        }
    }
    Ok(())
}

/// DataONE resolver when a member node is configured
fn dataset_resolver() -> Option<DataOneResolver> {
    match DataOneResolver::from_env() {
        Ok(resolver) => Some(resolver),
        Err(e) => {
            debug!("No dataset resolver: {}", e);
            None
        }
    }
}

fn as_dyn(resolver: &DataOneResolver) -> &dyn DatasetResolver {
    resolver
}
