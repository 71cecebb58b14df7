//! Posts, notes, and the collaborators the note pipeline talks to.
//!
//! - [`types`]: `Post`, `Media`, `MisleadingTag`, `ProposedMisleadingNote`
//! - [`traits`]: `PostSource`, `NoteSink`, `ProcessedStore`
//! - [`x`]: Community Notes API client implementing the first two
//! - [`store`]: in-memory and JSON-file processed-post stores
pub mod store;
pub mod traits;
pub mod types;
pub mod x;

pub use store::{JsonFileStore, MemoryStore};
pub use traits::{NoteSink, PostSource, ProcessedStore, SocialError, SocialResult, SubmittedNote};
pub use types::{Media, MediaKind, MisleadingTag, Post, ProposedMisleadingNote};
pub use x::XNotesApi;
