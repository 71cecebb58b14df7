//! Bounded-concurrency processing of a batch of eligible posts.

use crate::composer::{NoteOutcome, NoteResult, NoteWriter};
use futures::FutureExt;
use notewriter_common::NoteWriterError;
use notewriter_social::{NoteSink, Post, PostSource, ProcessedStore};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

const ALREADY_SUBMITTED_MARKER: &str = "already created a note";

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub num_posts: u32,
    pub concurrency: usize,
    pub dry_run: bool,
    pub test_mode: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            num_posts: 20,
            concurrency: 1,
            dry_run: false,
            test_mode: true,
        }
    }
}

/// What happened to one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostReport {
    Submitted,
    AlreadySubmitted,
    DryRunNote,
    Refusal,
    Error,
    SubmitFailed,
    Panicked,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub fetched: usize,
    pub skipped: usize,
    pub submitted: usize,
    pub already_submitted: usize,
    pub dry_run_notes: usize,
    pub refusals: usize,
    pub errors: usize,
    pub submit_failures: usize,
    pub panics: usize,
    pub not_started: usize,
}

impl BatchSummary {
    fn record(&mut self, report: PostReport) {
        match report {
            PostReport::Submitted => self.submitted += 1,
            PostReport::AlreadySubmitted => self.already_submitted += 1,
            PostReport::DryRunNote => self.dry_run_notes += 1,
            PostReport::Refusal => self.refusals += 1,
            PostReport::Error => self.errors += 1,
            PostReport::SubmitFailed => self.submit_failures += 1,
            PostReport::Panicked => self.panics += 1,
        }
    }
}

/// Whether a submission error means the note already exists upstream.
pub fn is_already_submitted(message: &str) -> bool {
    message.to_lowercase().contains(ALREADY_SUBMITTED_MARKER)
}

pub struct BatchRunner {
    writer: Arc<dyn NoteWriter>,
    source: Arc<dyn PostSource>,
    sink: Arc<dyn NoteSink>,
    store: Arc<dyn ProcessedStore>,
    config: BatchConfig,
    cancel: CancellationToken,
}

impl BatchRunner {
    pub fn new(
        writer: Arc<dyn NoteWriter>,
        source: Arc<dyn PostSource>,
        sink: Arc<dyn NoteSink>,
        store: Arc<dyn ProcessedStore>,
        config: BatchConfig,
    ) -> Self {
        Self {
            writer,
            source,
            sink,
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop dispatching new posts once `cancel` fires. In-flight posts finish.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetch eligible posts and process the unseen ones.
    ///
    /// Only a failure to fetch candidates fails the batch.
    pub async fn run(&self) -> notewriter_common::Result<BatchSummary> {
        let processed = match self.store.processed_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "batch.store.lookup_failed");
                HashSet::new()
            }
        };

        let posts = self
            .source
            .eligible_posts(self.config.num_posts)
            .await
            .map_err(|e| NoteWriterError::Upstream(format!("fetching eligible posts: {e}")))?;

        let mut summary = BatchSummary {
            fetched: posts.len(),
            ..Default::default()
        };
        let fresh: Vec<Post> = posts
            .into_iter()
            .filter(|p| !processed.contains(&p.post_id))
            .collect();
        summary.skipped = summary.fetched - fresh.len();
        tracing::info!(
            fetched = summary.fetched,
            skipped = summary.skipped,
            concurrency = self.config.concurrency,
            dry_run = self.config.dry_run,
            "batch.start"
        );

        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut pending = fresh.into_iter();

        for post in pending.by_ref() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    summary.not_started += 1;
                    break;
                }
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let worker = PostWorker {
                writer: self.writer.clone(),
                sink: self.sink.clone(),
                store: self.store.clone(),
                dry_run: self.config.dry_run,
                test_mode: self.config.test_mode,
            };
            tasks.spawn(async move {
                let post_id = post.post_id.clone();
                let report = AssertUnwindSafe(worker.process(post)).catch_unwind().await;
                drop(permit);
                match report {
                    Ok(report) => report,
                    Err(_) => {
                        tracing::error!(post_id = %post_id, "batch.post.panicked");
                        PostReport::Panicked
                    }
                }
            });
        }
        summary.not_started += pending.count();
        if summary.not_started > 0 {
            tracing::info!(not_started = summary.not_started, "batch.cancelled");
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => summary.record(report),
                Err(e) => {
                    tracing::error!(error = %e, "batch.task.join_failed");
                    summary.record(PostReport::Panicked);
                }
            }
        }

        tracing::info!(?summary, "batch.done");
        Ok(summary)
    }
}

struct PostWorker {
    writer: Arc<dyn NoteWriter>,
    sink: Arc<dyn NoteSink>,
    store: Arc<dyn ProcessedStore>,
    dry_run: bool,
    test_mode: bool,
}

impl PostWorker {
    async fn process(self, post: Post) -> PostReport {
        let result = self.writer.research_and_write(&post).await;
        log_result(&result);

        let note = match result.outcome {
            NoteOutcome::Note(note) => note,
            NoteOutcome::Refusal(_) => return PostReport::Refusal,
            NoteOutcome::Error(_) => return PostReport::Error,
        };

        if self.dry_run {
            return PostReport::DryRunNote;
        }

        let report = match self.sink.submit(&note, self.test_mode).await {
            Ok(submitted) => {
                tracing::info!(post_id = %note.post_id, note_id = ?submitted.note_id, "batch.note.submitted");
                PostReport::Submitted
            }
            Err(e) if is_already_submitted(&e.to_string()) => {
                tracing::info!(post_id = %note.post_id, "batch.note.already_submitted");
                PostReport::AlreadySubmitted
            }
            Err(e) => {
                tracing::error!(post_id = %note.post_id, error = %e, "batch.note.submit_failed");
                return PostReport::SubmitFailed;
            }
        };

        if let Err(e) = self.store.mark_processed(&note.post_id).await {
            tracing::warn!(post_id = %note.post_id, error = %e, "batch.store.mark_failed");
        }
        report
    }
}

fn log_result(result: &NoteResult) {
    let post_id = result.post.post_id.as_str();
    let text = result.post.trimmed_text().unwrap_or("");
    let images = result.images_summary.as_deref().unwrap_or("");
    match &result.outcome {
        NoteOutcome::Error(message) => {
            tracing::warn!(post_id, post_text = %text, images_summary = %images, error = %message, "batch.post.error")
        }
        NoteOutcome::Refusal(message) => {
            tracing::info!(post_id, post_text = %text, images_summary = %images, refusal = %message, "batch.post.refusal")
        }
        NoteOutcome::Note(note) => tracing::info!(
            post_id,
            post_text = %text,
            images_summary = %images,
            note = %note.note_text,
            tags = ?note.misleading_tags,
            "batch.post.note"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_submitted_is_case_insensitive() {
        assert!(is_already_submitted(
            "API error 403: You have Already Created a Note for this post"
        ));
        assert!(!is_already_submitted("rate limited"));
    }

    #[test]
    fn summary_counts_reports() {
        let mut s = BatchSummary::default();
        for r in [PostReport::Submitted, PostReport::Refusal, PostReport::Refusal, PostReport::Panicked] {
            s.record(r);
        }
        assert_eq!((s.submitted, s.refusals, s.panics), (1, 2, 1));
    }
}
