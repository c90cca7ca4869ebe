//! # Middleware
//!
//! Tower layers applied around the whole router.

pub mod tracing_layer;
