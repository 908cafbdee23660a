#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod channel;
pub mod error;
pub mod parser;
pub mod prefs;
pub mod probes;
pub mod rules;
pub mod scheduler;
pub mod settings;
pub mod sink;
pub mod telemetry;
pub mod types;

pub type Result<T> = std::result::Result<T, error::Error>;
