//! Web discovery and source checking.
//!
//! - Search backends behind [`engine::SearchEngine`]: Brave API (`brave`),
//!   Google News RSS (`rss`), DuckDuckGo HTML (`scrape`)
//! - Cascading orchestration with ranking and a TTL cache (`search`, `scoring`, `cache`)
//! - URL extraction and normalisation (`urls`)
//! - Fetch-and-classify verification of cited pages (`verify`)

pub mod brave;
pub mod cache;
pub mod engine;
pub mod rss;
pub mod scoring;
pub mod scrape;
pub mod search;
pub mod urls;
pub mod verify;

pub use cache::SearchCache;
pub use engine::{EngineOutcome, SearchEngine, SearchHit};
pub use search::{MultiEngineSearch, SEARCH_FAILED_SENTINEL};
pub use urls::{ensure_urls_have_protocol, extract_urls, retain_urls};
pub use verify::{HttpPageFetcher, PageFetcher, SourceVerifier, UrlVerdict, VerifiedSources};
