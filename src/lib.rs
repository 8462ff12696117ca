//! Subsift - proxy descriptor health checking and tiered selection
//!
//! Takes a list of vmess / vless / trojan / shadowsocks descriptors, keeps
//! the ones whose endpoint answers, and derives a restrictive subset using
//! per-country and per-port-class quotas.
//!
//! ## Features
//!
//! - Descriptor parsing for four protocol families
//! - TCP connect probing with retries and an optional ping fallback
//! - Bounded-concurrency health checks over thousands of descriptors
//! - Greedy quota-based selection by country and port class
//! - All-or-nothing output with minimum-count gating

pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod repository;
pub mod selection;
pub mod services;

pub use config::Config;
pub use error::{Result, SiftError};
pub use services::Pipeline;
