//! vidlock - chunked video ingestion, watermarking, per-segment encryption
//! and content-addressed publishing.
//!
//! This library crate exposes configuration loading and service wiring for
//! the binary and for integration testing.

pub mod config;
pub mod service;
