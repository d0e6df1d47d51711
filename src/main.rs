use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use restyle::{
    config::Config,
    jobs::{JobRequest, JobRunner, JobSubmission},
    transform::{TextRequest, TransformationService, WebpageRequest},
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Rewrite web pages or text in the voice of a persona.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Attribute usage to this user id
    #[arg(long, global = true)]
    user: Option<String>,

    /// Run through the background job runner and wait for the result
    #[arg(long, global = true, default_value_t = false)]
    background: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available personas
    Personas,
    /// Transform the page at URL
    Url { persona: String, url: String },
    /// Transform the given text
    Text {
        persona: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let shutdown = CancellationToken::new();
    let service = Arc::new(TransformationService::from_config(&config, shutdown.clone())?);

    let outcome = run(cli, &config, service.clone()).await;

    shutdown.cancel();
    for sweeper in service.take_sweepers() {
        let _ = sweeper.await;
    }
    outcome
}

async fn run(cli: Cli, config: &Config, service: Arc<TransformationService>) -> Result<()> {
    let request = match cli.command {
        Command::Personas => return print_json(&service.list_personas()),
        Command::Url { persona, url } => JobRequest::Webpage(WebpageRequest {
            url,
            persona,
            user_id: cli.user,
        }),
        Command::Text { persona, text } => JobRequest::Text(TextRequest {
            text: text.join(" "),
            persona,
            user_id: cli.user,
        }),
    };

    if cli.background {
        let runner = JobRunner::new(service, config.job_concurrency());
        return match runner.submit(request).await {
            JobSubmission::Cached(result) => print_json(&result),
            JobSubmission::Started(id) | JobSubmission::AlreadyRunning(id) => {
                let Some(snapshot) = runner.wait(id).await else {
                    bail!("job {} disappeared before finishing", id);
                };
                print_json(&snapshot)
            }
        };
    }

    let result = match request {
        JobRequest::Webpage(req) => service.transform_webpage(req).await,
        JobRequest::Text(req) => service.transform_text(req).await,
    };
    print_json(&result)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    // Logs go to stderr so stdout stays clean JSON output.
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
