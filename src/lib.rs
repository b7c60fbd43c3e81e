//! Rally Insights Server library.
//!
//! This library provides the core functionality for the insights server:
//! the Rally and LLM clients, the test-analytics aggregation pipeline, the
//! generation agents and the HTTP API exposing them.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
