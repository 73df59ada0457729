//! Loading local data that is about to be sprayed.
//!
//! - [`csv`]: Latin-1 delimited files with type inference

pub mod csv;

pub use self::csv::{DelimitedOptions, load_delimited, load_delimited_from_bytes};
