use anyhow::Result;
use restyle::{
    config::Config,
    jobs::{JobRequest, JobRunner, JobSubmission},
    transform::{TextRequest, TransformationService, WebpageRequest},
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Demo program that pushes a few transformations through the background job runner.
///
/// Usage: `cargo run --example job_runner_demo -- [url]`
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    // Stops the cache sweepers on exit.
    let shutdown = CancellationToken::new();
    let service = Arc::new(TransformationService::from_config(&config, shutdown.clone())?);
    let runner = JobRunner::new(service.clone(), config.job_concurrency());

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://www.rust-lang.org/".to_string());

    let requests = vec![
        JobRequest::Webpage(WebpageRequest {
            url: url.clone(),
            persona: "eli5".to_string(),
            user_id: None,
        }),
        // Same work again: reported as already running.
        JobRequest::Webpage(WebpageRequest {
            url,
            persona: "eli5".to_string(),
            user_id: None,
        }),
        JobRequest::Text(TextRequest {
            text: "Revenue grew four percent while costs stayed flat.".to_string(),
            persona: "pirate".to_string(),
            user_id: None,
        }),
    ];

    let mut ids = Vec::new();
    for request in requests {
        match runner.submit(request).await {
            JobSubmission::Cached(result) => println!("Cached: {}", result.transformed_content),
            JobSubmission::Started(id) => {
                println!("Started job {}", id);
                ids.push(id);
            }
            JobSubmission::AlreadyRunning(id) => println!("Job {} is already running", id),
        }
    }

    for id in ids {
        if let Some(snapshot) = runner.wait(id).await {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    println!("Pruned {} finished jobs", runner.prune_finished(Duration::ZERO));

    shutdown.cancel();
    for sweeper in service.take_sweepers() {
        sweeper.await?;
    }
    Ok(())
}
