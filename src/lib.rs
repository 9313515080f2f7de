//! Metasync - journaled metadata synchronization for repository REST APIs
//!
//! Metasync keeps a local copy of the metadata of repository objects
//! (items, collections, communities, bundles, bitstreams), records every
//! local edit in a journal, and replays the journal as JSON-Patch requests.
//!
//! # Architecture
//!
//! - [`core`] - Domain types, metadata store, journal, configuration
//! - [`rest`] - Transport trait, HTTP client, patch translation, paging
//! - [`sync`] - `SyncEngine`: track, commit, load
//! - [`logging`] - tracing subscriber setup
//!
//! # Correctness Invariants
//!
//! 1. A rejected mutation leaves the store and the journal untouched
//! 2. Journal entries are replayed in order, one request per entry
//! 3. An entry is dropped only after the server accepted it
//! 4. Paginated results come back in page order regardless of concurrency

pub mod core;
pub mod logging;
pub mod rest;
pub mod sync;
