//! Test doubles for the trait seams.
//!
//! - [`MockHttpClient`] - canned or channel-driven HTTP responses
//! - [`ManualScheduler`] - fake-clock timers
//! - [`ManualClock`] - settable wall clock

pub mod clock;
pub mod http;
pub mod scheduler;

pub use clock::ManualClock;
pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use scheduler::ManualScheduler;
