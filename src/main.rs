//! codegen-pipeline CLI
//!
//! Generates a Python function from a prompt, runs it in a sandbox, has it
//! reviewed and packages the result.

use std::path::PathBuf;

use clap::Parser;

use codegen_pipeline::{
    format_pipeline_result, CodegenTask, Credentials, Error, Pipeline, PipelineConfig,
    PipelineResult, Result,
};

/// Generate, test, review and package Python code.
#[derive(Parser, Debug)]
#[command(name = "codegen-pipeline", version, about)]
struct Cli {
    /// Prompt describing the code to generate.
    prompt: Vec<String>,

    /// YAML task file to read the prompt from.
    #[arg(long, conflicts_with = "prompt")]
    task: Option<PathBuf>,

    /// Configuration file (.toml, .yaml or .yml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory that receives packaged modules.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Generation attempts allowed (1 disables retries).
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(result) if result.success => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            tracing::error!(error = %e, "pipeline could not start");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<PipelineResult> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();

    let prompt = match &cli.task {
        Some(path) => {
            let task = CodegenTask::load(path)?;
            tracing::info!(task = %task.name, "loaded task");
            if let Some(max_attempts) = task.max_attempts {
                config.max_attempts = max_attempts;
            }
            task.full_prompt()
        }
        None => cli.prompt.join(" "),
    };
    if prompt.trim().is_empty() {
        return Err(Error::Config(
            "no prompt given (pass PROMPT or --task FILE)".to_string(),
        ));
    }

    if let Some(dir) = cli.output_dir {
        config.output.dir = dir;
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.max_attempts = max_attempts;
    }

    let credentials = Credentials::from_env()?;
    let pipeline = Pipeline::from_config(&config, &credentials)?;

    let result = pipeline.run(&prompt).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", format_pipeline_result(&result));
    }

    Ok(result)
}
