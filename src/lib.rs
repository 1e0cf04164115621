pub mod kernel;

// Re-export the engine surface for convenient access
pub use kernel::config::{EngineConfig, Environment};
pub use kernel::error::FlowError;
pub use kernel::telemetry::handle::Telemetry;
pub use kernel::telemetry::layer::UserflowLayer;
pub use kernel::telemetry::record::{Record, MAX_FIELD_LENGTH};
pub use kernel::telemetry::registry::FlowRegistry;
pub use kernel::telemetry::userflow::Userflow;
