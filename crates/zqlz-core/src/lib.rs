//! ZQLZ Core - Core types shared by the connection layers
//!
//! This crate provides the fundamental types that the other ZQLZ crates
//! depend on:
//!
//! - `ZqlzError` / `Result` - the error vocabulary, including connectivity classification
//! - `HostAddress` - a database host and port
//! - `Value`, `Row`, `QueryResult` - wire-level result data

mod error;
mod host;
mod types;

pub use error::*;
pub use host::*;
pub use types::*;
