//! Reposnap - bounded, filtered source tree snapshots for LLM review.
//!
//! Reposnap walks a repository to a limited depth, leaves out files matched
//! by the root ignore file or the extension/filename deny-lists, skips files
//! that are too large or too long, and returns the rest as a mapping from
//! relative path to content.
//!
//! # Quick Start
//!
//! ```no_run
//! use reposnap::walker::Collector;
//!
//! let collection = Collector::new()
//!     .max_depth(2)
//!     .max_lines(1000)
//!     .collect("./my-project")
//!     .unwrap();
//!
//! println!("{} files kept, {} skipped", collection.snapshot.len(), collection.skipped.len());
//! println!("{}", collection.snapshot.to_json().unwrap());
//! ```
//!
//! # Modules
//!
//! - [`ignorefile`] - Root ignore file parsing
//! - [`filter`] - Literal extension, filename and pattern exclusion
//! - [`walker`] - Depth-limited traversal into a snapshot
//! - [`snapshot`] - The path to content mapping
//! - [`config`] - Layered configuration
//! - [`chat`] - Remote chat sink
//! - [`review`] - Multi-repository review loop
//! - [`tokens`] - Token estimates
//! - [`logging`] - Subscriber setup

pub mod tokens;
pub mod ignorefile;
pub mod filter;
pub mod errors;
pub mod config;
pub mod snapshot;
pub mod walker;
pub mod chat;
pub mod review;
pub mod logging;

pub use chat::{ChatError, ChatMessage, ChatSink, OllamaClient, Role};
pub use config::{ChatConfig, Config, Limits};
pub use errors::SnapError;
pub use filter::{is_ignored, Filter, FilterResult, RejectReason};
pub use ignorefile::IgnoreRules;
pub use review::{ChatReviewer, RepoOutcome, SnapshotConsumer};
pub use snapshot::Snapshot;
pub use tokens::{count_tokens, Encoding};
pub use walker::{collect, depth, Collection, Collector, SkipReason, SkippedFile, WalkError};
