//! Weft - the core runtime of a programmable scannerless parser.
//!
//! This is the facade crate that re-exports functionality from the component
//! crates in the workspace:
//!
//! - [`core`] - parse-tree model, pools, construction, matching, printing
//! - [`input`] - backtrackable input streams feeding the scanner

// Re-export core functionality
pub use weft_core as core;

// Re-export the stream layer
pub use weft_input as input;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
