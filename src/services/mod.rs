//! Service layer
//!
//! - `io`: image decoding, PNG encoding and output path derivation
//! - `removal`: the request-facing entry point over the registry

pub mod io;
pub mod removal;

pub use io::{ImageIOService, OUTPUT_MARKER};
pub use removal::RemovalService;
