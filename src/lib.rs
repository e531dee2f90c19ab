//! Core engine of a desktop feed aggregator.
//!
//! The crate keeps a hierarchical tree of categories and feeds (with a
//! recycle bin) mirrored against a SQLite store, schedules per-feed
//! auto-updates, and serves a filtered message list whose read / important /
//! deleted transitions are written through the store under the supervision
//! of pluggable service hooks.
//!
//! Fetching and parsing of actual feed payloads is an external collaborator:
//! the scheduler emits [`scheduler::FeedUpdateRequest`] batches and ingested
//! messages come back through [`storage::Database::insert_message`].

pub mod config;
pub mod messages;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod tree;
