//! core::metadata
//!
//! Metadata values and the in-memory container that holds them.
//!
//! # Modules
//!
//! - [`value`] - A single language-tagged metadata value
//! - [`store`] - Tag to ordered value list mapping
//!
//! # Example
//!
//! ```
//! use metasync::core::metadata::{MetaStore, MetaValue, Removal};
//! use metasync::core::types::Tag;
//!
//! let subject = Tag::new("dc.subject").unwrap();
//! let mut store = MetaStore::new();
//! store.add(&subject, MetaValue::new("rust"));
//! store.add(&subject, MetaValue::new("json"));
//!
//! let removal = store.remove(&subject, Some(&"rust".into()));
//! assert_eq!(removal, Removal::Values(vec![0]));
//! ```

pub mod store;
pub mod value;

pub use store::{MetaStore, MetadataError, Removal};
pub use value::{MetaScalar, MetaValue, CONFIDENCE_UNSET};
