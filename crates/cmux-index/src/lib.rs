//! # cmux-index — Repository Index Cache
//!
//! Holds one cached [`RepositoryIndex`](cmux_core::RepositoryIndex) per
//! logical repository and keeps it consistent with storage without
//! rescanning on every request.
//!
//! ## Entry Lifecycle
//!
//! ```text
//! Unknown ──get──▶ Building ──ok──▶ Ready ──invalidate──▶ Invalidated
//!                     ▲   └─err/cancel──▶ Invalidated          │
//!                     └────────────────get─────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! - The repository → entry map is guarded by a short-lived mutex; lookup
//!   or create is atomic, and the lock is never held across storage I/O.
//! - Each entry has its own async rebuild lock. Callers that find the entry
//!   stale queue on that lock; whoever gets it first rebuilds, and the rest
//!   re-check freshness and return the same `Arc` it published.
//! - Invalidation bumps a per-entry generation. A rebuild only marks the
//!   entry fresh for the generation it observed when it started, so an
//!   invalidation that lands mid-rebuild is never lost.
//!
//! ## Mutations
//!
//! Uploads parse before they store, commit to storage before they
//! invalidate, and invalidate even when a later step of the same request
//! fails. See [`IndexCache::put_chart`].

pub mod artifacts;
pub mod cache;
pub mod error;

pub use cache::{EntryPhase, IndexCache, IndexCacheConfig};
pub use error::IndexError;
