//! The note pipeline: research a post, verify its sources, write and tag a
//! note, and run batches of posts with bounded concurrency.
//!
//! - [`composer`]: `NoteComposer` and the `NoteWriter` seam
//! - [`prompts`]: model prompt text
//! - [`tags`]: misleading-tag classification with a strict JSON parser
//! - [`batch`]: `BatchRunner`

pub mod batch;
pub mod composer;
pub mod prompts;
pub mod tags;

pub use batch::{BatchConfig, BatchRunner, BatchSummary, PostReport};
pub use composer::{NoteComposer, NoteOutcome, NoteResult, NoteWriter};
