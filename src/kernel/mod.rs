pub mod config;
pub mod error;
pub mod guard;
pub mod memory;
pub mod sampling;
pub mod session;
pub mod telemetry;
pub mod time;
