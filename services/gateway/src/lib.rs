//! Gateway service library crate.
//!
//! # Purpose
//! Exposes the HTTP surface, configuration, observability bootstrap, and
//! publisher wiring for use by the binary and the integration tests.
pub mod api;
pub mod app;
pub mod config;
pub mod observability;
pub mod publisher;
