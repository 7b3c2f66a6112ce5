//! High-level client API: configuration, session lifecycle and swarm helpers

mod a2a;
pub mod builder;
pub mod config;
pub mod helpers;
pub mod logging;
pub mod tls;

pub use a2a::{A2AClient, ClientStack};
pub use builder::A2AClientBuilder;
pub use config::{CertificateConfig, ClientConfig, LogLevel, LoggingConfig};
pub use helpers::{SwarmOptions, SwarmProvider, SwarmTopology, TrainingParticipant};
pub use logging::init_logging;
