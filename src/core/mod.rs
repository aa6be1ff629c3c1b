//! Core translation engine module

pub mod cache;
pub mod config;
pub mod errors;
pub mod language;
pub mod latency;
pub mod models;
pub mod orchestrator;
pub mod rate_limiter;
pub mod service;
