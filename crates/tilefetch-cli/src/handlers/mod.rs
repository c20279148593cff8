//! Command handlers.
//!
//! Each handler parses CLI-specific input, calls the download service or
//! config store, and prints the result for the terminal. Events stream to
//! stdout as JSON lines; human-readable summaries go to stderr.

pub mod catalog;
pub mod config;
pub mod download;
