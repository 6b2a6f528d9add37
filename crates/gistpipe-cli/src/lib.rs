//! `gistpipe` crate (library surface).
//!
//! The primary entrypoint is the `gistpipe` binary. This module re-exports the pipeline
//! crates so embedders can depend on one package.

pub use gistpipe_core as core;
pub use gistpipe_local as local;
