#![deny(missing_docs)]

//! # cmux-core — Foundational Types for cmux
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies and performs no I/O.
//!
//! ## Design Principles
//!
//! 1. **Newtypes for tenancy primitives.** A [`RepositoryId`] can only be
//!    built from validated path segments, so storage keys derived from it
//!    never contain `.`/`..` or empty segments.
//!
//! 2. **Indexes are values.** A [`RepositoryIndex`] is built once from a set
//!    of [`IndexEntry`] values and never mutated afterwards. Caches hand
//!    out `Arc<RepositoryIndex>` and replace the whole value on rebuild.
//!
//! 3. **One artifact classifier.** [`ArtifactKind::classify`] is the single
//!    place that decides whether a filename is a chart archive, a
//!    provenance file, or something the server does not serve.

pub mod artifact;
pub mod digest;
pub mod error;
pub mod index;
pub mod repository;

// Re-export primary types at crate root for ergonomic imports.
pub use artifact::{chart_filename, provenance_filename, ArtifactKind};
pub use digest::sha256_hex;
pub use error::ValidationError;
pub use index::{ChartMaintainer, ChartMetadata, IndexEntry, RepositoryIndex, INDEX_API_VERSION};
pub use repository::{validate_segment, Depth, RepositoryId};
