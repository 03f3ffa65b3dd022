use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chainward::config::Config;
use chainward::engine::Validator;
use chainward::model::{
    parse_instance_file, parse_model_file, validate_instance, validate_model,
};
use chainward::store::SparqlStore;

#[derive(Parser)]
#[command(name = "chainward")]
#[command(about = "Hand-off chain workflow validation engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port override
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Validate a workflow instance against its model
    Validate {
        /// Path to the workflow model YAML file
        #[arg(short, long)]
        model: PathBuf,
        /// Path to the workflow instance YAML file
        #[arg(short, long)]
        instance: PathBuf,
        /// Print every per-job result, not just the verdict
        #[arg(short, long)]
        detailed: bool,
    },
    /// Print the planned validation jobs without evaluating them
    Plan {
        /// Path to the workflow model YAML file
        #[arg(short, long)]
        model: PathBuf,
        /// Path to the workflow instance YAML file
        #[arg(short, long)]
        instance: PathBuf,
    },
    /// Check a model (and optionally an instance) for consistency issues
    Check {
        /// Path to the workflow model YAML file
        #[arg(short, long)]
        model: PathBuf,
        /// Path to the workflow instance YAML file
        #[arg(short, long)]
        instance: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error [{}]: {}", e.code(), e);
        std::process::exit(1);
    }
}

fn build_validator(config: &Config) -> chainward::Result<Validator> {
    let store = Arc::new(SparqlStore::new(config.store.to_sparql_config())?);
    let mut validator = Validator::new(store);
    if let Some(workers) = config.validation.workers {
        validator = validator.with_workers(workers);
    }
    Ok(validator)
}

async fn run() -> chainward::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load();

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            chainward::api::serve(config).await
        }

        Commands::Validate {
            model,
            instance,
            detailed,
        } => {
            let model = parse_model_file(&model)?;
            let instance = parse_instance_file(&instance)?;
            let validator = build_validator(&config)?;

            let report = validator
                .validate_with_deadline(&model, &instance, config.validation.deadline())
                .await?;

            if detailed {
                for result in &report.results {
                    let marker = if result.conforms { "PASS" } else { "FAIL" };
                    println!(
                        "[{}] step '{}', object {}, position {}",
                        marker, result.job.step_name, result.job.object, result.job.position
                    );
                    if !result.conforms {
                        for line in result.diagnostic.lines() {
                            println!("       {}", line);
                        }
                    }
                }
            }

            if report.valid {
                println!("valid");
                Ok(())
            } else {
                println!(
                    "invalid ({} of {} jobs failed)",
                    report.failures().count(),
                    report.results.len()
                );
                std::process::exit(2);
            }
        }

        Commands::Plan { model, instance } => {
            let model = parse_model_file(&model)?;
            let instance = parse_instance_file(&instance)?;
            let validator = build_validator(&config)?;

            let jobs = validator.plan(&model, &instance).await?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
            Ok(())
        }

        Commands::Check { model, instance } => {
            let model = parse_model_file(&model)?;
            let mut warnings = validate_model(&model)?;

            if let Some(instance) = instance {
                let instance = parse_instance_file(&instance)?;
                warnings.extend(validate_instance(&model, &instance)?);
            }

            if warnings.is_empty() {
                println!("ok");
            } else {
                for warning in &warnings {
                    println!("warning: {}", warning);
                }
            }
            Ok(())
        }
    }
}
