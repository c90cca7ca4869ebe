//! # cmux-cli — The `cmux` Binary
//!
//! ## Subcommands
//!
//! - `cmux serve`: run the multi-tenant chart repository server.
//! - `cmux index`: build one repository's `index.yaml` from a local
//!   storage root and print it.
//!
//! Every `serve` flag can also be set through a `CMUX_*` environment
//! variable:
//!
//! ```bash
//! cmux serve --depth 2 --storage-dir /var/lib/charts --port 8080
//! CMUX_DEPTH=2 CMUX_STORAGE_DIR=/var/lib/charts cmux serve
//! cmux index /var/lib/charts --depth-prefix org1/team1
//! ```

pub mod index;
pub mod serve;
