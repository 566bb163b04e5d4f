//! Common utilities, types, and configuration shared across SRQL crates.
//!
//! This crate contains the base building blocks for the SRQL engine:
//! - **Configuration**: Strongly typed application configuration (`config`).
//! - **Models**: Values, rows, paths, and API envelopes (`models`).
//! - **Resilience**: Retry with exponential backoff (`retry`).
//! - **Logging**: Query-literal scrubbing for log output (`scrubber`).
pub mod config;
pub mod models;
pub mod retry;
pub mod scrubber;
