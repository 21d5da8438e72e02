//! Error handling for the chat client core.
//!
//! Domain errors are `thiserror` enums per concern and fold into [`ChatError`]:
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Network | Connection, timeout, unreachable store | Yes |
//! | Server | Backend 5xx, provider errors, store rejections | Yes |
//! | Client | Malformed stream bodies, 4xx | No |
//! | User | User action required | No |
//! | Configuration | Config issues | No |

mod category;
mod chat_error;
mod config;
mod result;
mod store;
mod stream;

pub use category::ErrorCategory;
pub use chat_error::ChatError;
pub use config::ConfigError;
pub use result::{ChatResult, LogErrorExt};
pub use store::StoreError;
pub use stream::StreamError;
