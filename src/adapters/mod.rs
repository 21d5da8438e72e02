//! Concrete implementations of the traits in `crate::traits`.
//!
//! - [`ReqwestHttpClient`] - HTTP over reqwest
//! - [`TokioScheduler`] - tokio timers
//! - [`SystemClock`] - wall clock
//! - [`StaticIdentity`] - fixed user
//! - [`InMemoryStore`] - reactive in-process document store
//!
//! The [`mock`] submodule holds the test doubles.

pub mod identity;
pub mod memory_store;
pub mod mock;
pub mod reqwest_http;
pub mod system_clock;
pub mod tokio_scheduler;

pub use identity::StaticIdentity;
pub use memory_store::{InMemoryStore, Mutation, StoreOp};
pub use reqwest_http::ReqwestHttpClient;
pub use system_clock::SystemClock;
pub use tokio_scheduler::TokioScheduler;
