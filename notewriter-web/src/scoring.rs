//! Priority scores for search hits; higher means more trustworthy or recent.

use crate::engine::SearchHit;
use url::Url;

const TRUSTED_TLDS: &[&str] = &[".gov", ".edu", ".org"];

const MAJOR_OUTLETS: &[&str] = &[
    "reuters.com",
    "apnews.com",
    "bbc.com",
    "bbc.co.uk",
    "npr.org",
    "pbs.org",
    "nytimes.com",
    "washingtonpost.com",
    "wsj.com",
    "theguardian.com",
    "cnn.com",
    "nbcnews.com",
    "cbsnews.com",
    "abcnews.go.com",
    "bloomberg.com",
    "politico.com",
    "axios.com",
    "usatoday.com",
    "ft.com",
    "economist.com",
];

const NEWS_TOKENS: &[&str] = &["news", "times", "post", "journal", "tribune", "herald"];

const RECENCY_KEYWORDS: &[&str] = &[
    "2025",
    "2024",
    "today",
    "breaking",
    "latest",
    "this week",
    "hours ago",
];

const TRUSTED_TLD_POINTS: i32 = 30;
const MAJOR_OUTLET_POINTS: i32 = 20;
const NEWS_TOKEN_POINTS: i32 = 10;
const RECENCY_POINTS: i32 = 5;
const RECENCY_CAP: i32 = 15;
const QUERY_TERM_POINTS: i32 = 2;
const QUERY_TERM_CAP: i32 = 20;
const MIN_QUERY_TERM_LEN: usize = 4;

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default()
}

fn domain_score(host: &str) -> i32 {
    if host.is_empty() {
        return 0;
    }
    if TRUSTED_TLDS.iter().any(|tld| host.ends_with(tld)) {
        return TRUSTED_TLD_POINTS;
    }
    let is_major = MAJOR_OUTLETS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")));
    if is_major {
        return MAJOR_OUTLET_POINTS;
    }
    if NEWS_TOKENS.iter().any(|t| host.contains(t)) {
        return NEWS_TOKEN_POINTS;
    }
    0
}

/// Score a hit against the query that produced it.
pub fn score_hit(hit: &SearchHit, query: &str) -> i32 {
    let haystack = format!("{} {}", hit.title, hit.description).to_lowercase();

    let recency = RECENCY_KEYWORDS
        .iter()
        .filter(|k| haystack.contains(*k))
        .count() as i32
        * RECENCY_POINTS;

    let overlap = query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_QUERY_TERM_LEN)
        .filter(|w| haystack.contains(*w))
        .count() as i32
        * QUERY_TERM_POINTS;

    domain_score(&host_of(&hit.url)) + recency.min(RECENCY_CAP) + overlap.min(QUERY_TERM_CAP)
}

/// Pair every hit with its score, ordered best first. Ties keep input order.
pub fn rank_hits(hits: Vec<SearchHit>, query: &str, max_results: usize) -> Vec<(i32, SearchHit)> {
    let mut scored: Vec<(i32, SearchHit)> =
        hits.into_iter().map(|h| (score_hit(&h, query), h)).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(max_results);
    scored
}
