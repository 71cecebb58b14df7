use async_trait::async_trait;

/// One result row from a search backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// What a single engine produced for a query.
#[derive(Debug, Clone)]
pub enum EngineOutcome {
    Hits(Vec<SearchHit>),
    NoResults,
    Failed(String),
}

impl EngineOutcome {
    /// Normalises an empty hit list to `NoResults`.
    pub fn from_hits(hits: Vec<SearchHit>) -> Self {
        if hits.is_empty() {
            EngineOutcome::NoResults
        } else {
            EngineOutcome::Hits(hits)
        }
    }
}

#[async_trait]
pub trait SearchEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Never errors; failures are reported as [`EngineOutcome::Failed`].
    async fn search(&self, query: &str, max_results: usize) -> EngineOutcome;
}

/// Collapse whitespace and drop inline markup from snippet text.
pub(crate) fn clean_snippet(raw: &str) -> String {
    let fragment = scraper::Html::parse_fragment(raw);
    let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_hits_become_no_results() {
        assert!(matches!(
            EngineOutcome::from_hits(Vec::new()),
            EngineOutcome::NoResults
        ));
    }

    #[test]
    fn snippets_lose_tags_and_entities() {
        assert_eq!(
            clean_snippet("The <strong>bill</strong>  was &amp; signed\n today"),
            "The bill was & signed today"
        );
    }
}
