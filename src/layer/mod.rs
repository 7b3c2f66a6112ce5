//! Tower Layer implementations for A2A coordination

pub mod retry;
pub mod validation;

pub use retry::{BackoffStrategy, RetryLayer, RetryPolicy, RetryService};
pub use validation::{A2AValidationLayer, A2AValidationService};
