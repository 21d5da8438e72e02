//! Parlance - streaming chat client core
//!
//! Smoothed text reveal, throttled persistence and optimistic reconciliation
//! for an LLM chat client. The binary in `main.rs` is a thin CLI over
//! [`controller::ChatController`]; this library exposes the modules for it and
//! for integration tests.

pub mod adapters;
pub mod batcher;
pub mod config;
pub mod controller;
pub mod error;
pub mod inference;
pub mod models;
pub mod prelude;
pub mod stream;
pub mod title;
pub mod traits;
pub mod typing;
