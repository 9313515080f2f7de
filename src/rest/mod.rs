//! rest
//!
//! Access to the repository REST API.
//!
//! # Architecture
//!
//! The [`Transport`] trait is the only thing the sync engine and the paged
//! fetcher depend on. [`RestClient`] implements it over HTTP with request
//! priming and anti-forgery token refresh; [`mock::MockTransport`] implements
//! it in memory for tests.
//!
//! Failures here never touch local state. A failed commit leaves the
//! journal entries it could not send in place.
//!
//! # Modules
//!
//! - `traits`: `Transport` trait and `RestError`
//! - [`client`]: reqwest-backed transport
//! - [`session`]: anti-forgery token and login state
//! - [`patch`]: journal entry to JSON-Patch translation
//! - [`paging`]: order-preserving paginated retrieval
//! - [`mock`]: in-memory transport for deterministic testing

pub mod client;
pub mod mock;
pub mod paging;
pub mod patch;
pub mod session;
mod traits;

pub use client::{EndpointInfo, RequestBody, RestClient};
pub use paging::{Page, PagedFetcher};
pub use patch::{PatchDescriptor, PatchError, PatchOp, PatchTranslator};
pub use session::XsrfSession;
pub use traits::*;
