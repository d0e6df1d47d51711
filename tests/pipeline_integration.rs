mod helpers;

use serde_json::json;
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use helpers::{CountingGenerator, CountingSource, article, harness, output};
use restyle::{
    cache::PipelineCaches,
    fetcher::{ContentFetcher, FetchError, FetcherConfig},
    generator::{GenerationError, OpenAiGenerator},
    personas::InMemoryPersonaRegistry,
    transform::{
        DIRECT_TEXT_TITLE, ErrorCode, TextRequest, TransformationPipeline, TransformationService,
        WebpageRequest,
    },
    usage::InMemoryUsageTracker,
};

fn webpage(url: &str, persona: &str) -> WebpageRequest {
    WebpageRequest {
        url: url.to_string(),
        persona: persona.to_string(),
        user_id: Some("user-1".to_string()),
    }
}

fn text(text: &str, persona: &str) -> TextRequest {
    TextRequest {
        text: text.to_string(),
        persona: persona.to_string(),
        user_id: Some("user-1".to_string()),
    }
}

#[tokio::test]
async fn test_repeat_request_served_from_transform_cache() {
    let source = CountingSource::articles();
    let generator = CountingGenerator::replying("Tides are the sea breathing in and out.");
    let h = harness(source.clone(), generator.clone());

    let first = h
        .service
        .transform_webpage(webpage("https://example.com/tides", "eli5"))
        .await;
    let second = h
        .service
        .transform_webpage(webpage("https://example.com/tides", "eli5"))
        .await;

    assert!(first.success);
    assert!(!first.is_cached());
    assert!(second.success);
    assert_eq!(second.cached, Some(true));
    assert_eq!(first.data, second.data);

    assert_eq!(source.calls(), 1);
    assert_eq!(generator.calls(), 1);

    let usage = h.usage.usage_for("user-1").unwrap();
    assert_eq!(usage.transformations, 2);
    assert_eq!(usage.cached_transformations, 1);
    assert_eq!(usage.tokens, 60);
}

#[tokio::test]
async fn test_other_persona_reuses_scraped_content() {
    let source = CountingSource::articles();
    let generator = CountingGenerator::replying("rewritten");
    let h = harness(source.clone(), generator.clone());

    let eli5 = h
        .service
        .transform_webpage(webpage("https://example.com/tides", "eli5"))
        .await;
    let pirate = h
        .service
        .transform_webpage(webpage("https://example.com/tides", "pirate"))
        .await;

    assert!(eli5.success && pirate.success);
    assert!(!pirate.is_cached());
    assert_eq!(pirate.data.unwrap().persona.id, "pirate");
    assert_eq!(source.calls(), 1);
    assert_eq!(generator.calls(), 2);

    let request = generator.last_request().unwrap();
    assert!(request.user_prompt.contains("Title: Tides Explained"));
    assert!(request.system_prompt.to_lowercase().contains("pirate"));
}

#[tokio::test]
async fn test_urls_are_cached_independently() {
    let source = CountingSource::articles();
    let generator = CountingGenerator::replying("rewritten");
    let h = harness(source.clone(), generator.clone());

    for url in ["https://example.com/a", "https://example.com/b"] {
        let result = h.service.transform_webpage(webpage(url, "eli5")).await;
        assert!(!result.is_cached());
        assert_eq!(result.data.unwrap().original_content.url, url);
    }

    assert_eq!(source.calls(), 2);
    assert_eq!(generator.calls(), 2);
    assert_eq!(h.service.cache_stats().transform.entries, 2);
}

#[tokio::test]
async fn test_failed_generation_is_not_cached() {
    let source = CountingSource::articles();
    let generator = CountingGenerator::new(|call| match call {
        0 => Err(GenerationError::Api {
            status: 503,
            message: "overloaded".to_string(),
        }),
        _ => Ok(output("second time lucky")),
    });
    let h = harness(source.clone(), generator.clone());

    let failed = h
        .service
        .transform_webpage(webpage("https://example.com/tides", "eli5"))
        .await;
    assert!(!failed.success);
    assert_eq!(failed.error_code, Some(ErrorCode::TransformationFailed));
    assert!(failed.error.as_deref().unwrap().contains("overloaded"));
    let data = failed.data.unwrap();
    assert!(data.transformed_content.is_empty());
    assert_eq!(data.original_content.title, "Tides Explained");

    let retried = h
        .service
        .transform_webpage(webpage("https://example.com/tides", "eli5"))
        .await;
    assert!(retried.success);
    assert!(!retried.is_cached());
    assert_eq!(retried.data.unwrap().transformed_content, "second time lucky");

    // Scraped content survives the failed generation.
    assert_eq!(source.calls(), 1);
    assert_eq!(generator.calls(), 2);
    assert_eq!(h.usage.usage_for("user-1").unwrap().failed_attempts, 1);
}

#[tokio::test]
async fn test_empty_completion_is_a_success() {
    let source = CountingSource::articles();
    let generator = CountingGenerator::replying("");
    let h = harness(source.clone(), generator.clone());

    let result = h
        .service
        .transform_webpage(webpage("https://example.com/tides", "eli5"))
        .await;

    assert!(result.success);
    assert_eq!(result.data.unwrap().transformed_content, "");
    assert_eq!(h.service.cache_stats().transform.entries, 1);
}

#[tokio::test]
async fn test_missing_completion_is_a_failure() {
    let source = CountingSource::articles();
    let generator = CountingGenerator::new(|_| Err(GenerationError::NoContent));
    let h = harness(source.clone(), generator.clone());

    let result = h
        .service
        .transform_webpage(webpage("https://example.com/tides", "eli5"))
        .await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::TransformationFailed));
    assert_eq!(h.service.cache_stats().transform.entries, 0);
}

#[tokio::test]
async fn test_generation_failures_stay_transformation_failures() {
    let failures = vec![
        GenerationError::Api {
            status: 404,
            message: "The model `gpt-9` does not exist".to_string(),
        },
        GenerationError::Transport("error sending request: operation timed out".to_string()),
        GenerationError::Api {
            status: 403,
            message: "forbidden: dns zone not allowed".to_string(),
        },
    ];

    for failure in failures {
        let message = failure.to_string();
        let generator = CountingGenerator::new(move |_| Err(failure.clone()));
        let h = harness(CountingSource::articles(), generator);

        let result = h
            .service
            .transform_webpage(webpage("https://example.com/tides", "eli5"))
            .await;

        assert!(!result.success);
        assert_eq!(
            result.error_code,
            Some(ErrorCode::TransformationFailed),
            "for {}",
            message
        );
        assert_eq!(result.error.as_deref(), Some(message.as_str()));
        assert_eq!(result.data.unwrap().original_content.title, "Tides Explained");

        let text_result = h
            .service
            .transform_text(text("The tide is high but I'm holding on.", "eli5"))
            .await;
        assert_eq!(text_result.error_code, Some(ErrorCode::TransformationFailed));
    }
}

#[tokio::test]
async fn test_fetch_errors_are_classified() {
    let cases: Vec<(FetchError, ErrorCode)> = vec![
        (FetchError::NotFound, ErrorCode::ScrapingFailed),
        (FetchError::Forbidden, ErrorCode::ScrapingFailed),
        (FetchError::Timeout, ErrorCode::NetworkError),
        (FetchError::Dns("no such host".into()), ErrorCode::NetworkError),
        (FetchError::InvalidUrl("bad".into()), ErrorCode::InvalidUrl),
        (FetchError::Unknown("weird".into()), ErrorCode::UnknownError),
    ];

    for (error, expected) in cases {
        let message = error.to_string();
        let slot = std::sync::Mutex::new(Some(error));
        let source = CountingSource::new(move |_| Err(slot.lock().unwrap().take().unwrap()));
        let generator = CountingGenerator::replying("unused");
        let h = harness(source, generator.clone());

        let result = h
            .service
            .transform_webpage(webpage("https://example.com/x", "eli5"))
            .await;

        assert!(!result.success);
        assert_eq!(result.error_code, Some(expected), "for {}", message);
        assert_eq!(result.details.as_deref(), Some(message.as_str()));
        assert_eq!(generator.calls(), 0);
    }
}

#[tokio::test]
async fn test_private_url_rejected_without_network() {
    let generator = CountingGenerator::replying("unused");
    let pipeline = TransformationPipeline::new(
        PipelineCaches::new(),
        Arc::new(ContentFetcher::new(FetcherConfig::default()).unwrap()),
        generator.clone(),
        Arc::new(InMemoryPersonaRegistry::with_defaults()),
        Arc::new(InMemoryUsageTracker::new()),
    );
    let service = TransformationService::new(Arc::new(pipeline), 50_000);

    let result = service
        .transform_webpage(webpage("http://169.254.169.254/latest/meta-data", "eli5"))
        .await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::InvalidUrl));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_unknown_persona_fails_before_fetch() {
    let source = CountingSource::articles();
    let generator = CountingGenerator::replying("unused");
    let h = harness(source.clone(), generator.clone());

    let result = h
        .service
        .transform_webpage(webpage("https://example.com/tides", "villain"))
        .await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::TransformationFailed));
    assert!(result.error.unwrap().contains("villain"));
    assert_eq!(source.calls(), 0);
    assert_eq!(generator.calls(), 0);
    assert_eq!(h.usage.usage_for("user-1").unwrap().failed_attempts, 1);
}

#[tokio::test]
async fn test_cache_clears_are_independent() {
    let source = CountingSource::articles();
    let generator = CountingGenerator::replying("rewritten");
    let h = harness(source.clone(), generator.clone());
    let request = || webpage("https://example.com/tides", "eli5");

    h.service.transform_webpage(request()).await;

    h.service.clear_transform_cache();
    assert_eq!(h.service.cache_stats().content.entries, 1);
    let regenerated = h.service.transform_webpage(request()).await;
    assert!(!regenerated.is_cached());
    assert_eq!(source.calls(), 1);
    assert_eq!(generator.calls(), 2);

    h.service.clear_scrape_cache();
    assert_eq!(h.service.cache_stats().transform.entries, 1);
    let cached = h.service.transform_webpage(request()).await;
    assert!(cached.is_cached());
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_text_transformation() {
    let source = CountingSource::articles();
    let generator = CountingGenerator::replying("Once upon a time...");
    let h = harness(source.clone(), generator.clone());

    let result = h
        .service
        .transform_text(text("Quarterly revenue grew by four percent.", "eli5"))
        .await;

    assert!(result.success);
    assert_eq!(result.cached, None);
    let data = result.data.unwrap();
    assert_eq!(data.original_content.title, DIRECT_TEXT_TITLE);
    assert_eq!(data.original_content.word_count, 6);
    assert_eq!(data.transformed_content, "Once upon a time...");
    assert_eq!(source.calls(), 0);

    let prompt = generator.last_request().unwrap().user_prompt;
    assert!(prompt.contains("Quarterly revenue grew by four percent."));
}

#[tokio::test]
async fn test_text_validation_skips_generation() {
    let generator = CountingGenerator::replying("unused");
    let h = harness(CountingSource::articles(), generator.clone());

    let result = h.service.transform_text(text("", "eli5")).await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::InvalidText));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_end_to_end_against_http_servers() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tides"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><head><title>Tides</title></head><body><article><p>The moon pulls on \
             the oceans of the earth, and where it pulls hardest the water bulges toward it. \
             As the earth turns each coast passes through the bulges.</p></article></body></html>",
            "text/html; charset=utf-8",
        ))
        .expect(1)
        .mount(&site)
        .await;

    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "## The Moon Gives the Sea a Hug\n\nThe moon is like a big magnet..."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 300, "completion_tokens": 80, "total_tokens": 380}
        })))
        .expect(1)
        .mount(&api)
        .await;

    let usage = Arc::new(InMemoryUsageTracker::new());
    let pipeline = TransformationPipeline::new(
        PipelineCaches::new(),
        Arc::new(
            ContentFetcher::new(FetcherConfig {
                allow_private_hosts: true,
                ..FetcherConfig::default()
            })
            .unwrap(),
        ),
        Arc::new(
            OpenAiGenerator::new(&format!("{}/v1", api.uri()), "sk-test", "gpt-4o-mini").unwrap(),
        ),
        Arc::new(InMemoryPersonaRegistry::with_defaults()),
        usage.clone(),
    );
    let service = TransformationService::new(Arc::new(pipeline), 50_000);
    let url = format!("{}/tides", site.uri());

    let first = service.transform_webpage(webpage(&url, "eli5")).await;
    assert!(first.success, "{:?}", first.error);
    let data = first.data.clone().unwrap();
    assert_eq!(data.original_content.title, "Tides");
    assert!(data.transformed_content.starts_with("## The Moon"));
    assert_eq!(data.usage.unwrap().total_tokens, 380);
    assert_eq!(data.persona.id, "eli5");

    let second = service.transform_webpage(webpage(&url, "eli5")).await;
    assert_eq!(second.cached, Some(true));
    assert_eq!(second.data, first.data);

    let totals = usage.usage_for("user-1").unwrap();
    assert_eq!(totals.transformations, 2);
    assert_eq!(totals.cached_transformations, 1);
    assert_eq!(totals.tokens, 380);
}

#[tokio::test]
async fn test_cache_stats_count_misses() {
    let source = CountingSource::new(|url| {
        let mut content = article(url);
        content.title = "Shared".to_string();
        Ok(content)
    });
    let h = harness(source.clone(), CountingGenerator::replying("x"));

    h.service
        .transform_webpage(webpage("https://example.com/tides", "eli5"))
        .await;

    let stats = h.service.cache_stats();
    assert_eq!(stats.content.entries, 1);
    assert_eq!(stats.content.misses, 1);
    assert_eq!(stats.transform.misses, 1);
}
