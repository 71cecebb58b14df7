use anyhow::{Context, Result};
use notewriter_config::NoteWriterConfig;
use notewriter_http::FetchOpts;
use notewriter_llm::{LlmGateway, RateLimiter, RetryPolicy, ensure_llm_ready};
use notewriter_notes::{BatchConfig, BatchRunner, BatchSummary, NoteComposer};
use notewriter_social::{JsonFileStore, MemoryStore, ProcessedStore, XNotesApi};
use notewriter_web::{HttpPageFetcher, MultiEngineSearch, SearchCache, SourceVerifier};
use std::sync::Arc;
use notewriter_runtime::CancellationToken;

/// Everything a batch needs, assembled from configuration.
pub struct Tether {
    runner: BatchRunner,
}

impl Tether {
    pub async fn run(self) -> Result<BatchSummary> {
        Ok(self.runner.run().await?)
    }
}

pub async fn build_from_config(cfg: &NoteWriterConfig, cancel: CancellationToken) -> Result<Tether> {
    let llm_config = cfg.llm_config()?;
    let client = ensure_llm_ready(&llm_config).await?;
    let limiter = Arc::new(RateLimiter::new(cfg.llm.min_request_interval()));
    let gateway = LlmGateway::new(client, limiter, RetryPolicy::new(cfg.llm.max_retries))
        .context("building LLM gateway")?;

    let cache = Arc::new(SearchCache::new(cfg.search.cache_ttl()));
    let search = MultiEngineSearch::with_default_engines(
        cfg.search.brave_api_key().map(str::to_string),
        cache,
    )
    .context("building search engines")?;
    tracing::info!(engines = ?search.engine_names(), "app.search.ready");

    let fetcher = HttpPageFetcher::new(FetchOpts {
        timeout: cfg.verify.fetch_timeout(),
        max_bytes: cfg.verify.max_page_bytes,
        ..FetchOpts::default()
    })
    .context("building page fetcher")?;
    let verifier = SourceVerifier::new(Arc::new(fetcher), gateway.clone())
        .with_max_urls(cfg.verify.max_urls);

    let composer = NoteComposer::new(gateway, Arc::new(search), Arc::new(verifier))
        .with_max_search_results(cfg.search.max_results);

    let bearer = cfg
        .x_api
        .bearer_token()
        .context("x_api.bearer_token is not set")?
        .to_string();
    let x_api = Arc::new(
        XNotesApi::new(bearer, Some(cfg.x_api.base_url.as_str()), cfg.run.test_mode)
            .context("building X API client")?,
    );

    let store: Arc<dyn ProcessedStore> = match &cfg.store.path {
        Some(path) => {
            tracing::info!(path = %path.display(), "app.store.json");
            Arc::new(JsonFileStore::new(path))
        }
        None => {
            tracing::info!("app.store.memory");
            Arc::new(MemoryStore::new())
        }
    };

    let runner = BatchRunner::new(
        Arc::new(composer),
        x_api.clone(),
        x_api,
        store,
        BatchConfig {
            num_posts: cfg.run.num_posts,
            concurrency: cfg.run.concurrency,
            dry_run: cfg.run.dry_run,
            test_mode: cfg.run.test_mode,
        },
    )
    .with_cancellation(cancel);

    Ok(Tether { runner })
}
