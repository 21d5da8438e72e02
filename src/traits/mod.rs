//! Trait abstractions for dependency injection and testability.
//!
//! - [`HttpClient`] - POST and streaming POST
//! - [`DocumentStore`] - remote mutations and the live message query
//! - [`Scheduler`] - delayed, cancellable tasks
//! - [`Clock`] - wall-clock timestamps
//! - [`IdentityProvider`] - the signed-in user

pub mod clock;
pub mod http;
pub mod identity;
pub mod scheduler;
pub mod store;

pub use clock::Clock;
pub use http::{json_headers, ByteStream, Headers, HttpClient, HttpError, Response};
pub use identity::{IdentityProvider, UserIdentity};
pub use scheduler::{Scheduler, TimerHandle};
pub use store::{CreateChatArgs, CreateMessageArgs, DocumentStore, SnapshotStream, UpdateMessageArgs};
