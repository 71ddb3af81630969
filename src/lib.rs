//! Mosaicforge - turn videos and images into palette-tile mosaics
//!
//! This library crate exposes the pipeline for the binary and for
//! integration testing.

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;

pub use error::{Error, Result};
