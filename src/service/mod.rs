//! Tower Service implementations

pub mod core;
pub mod request;

pub use core::A2AProtocolService;
pub use request::{A2ARequest, RequestContext};
