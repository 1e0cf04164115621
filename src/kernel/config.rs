use serde::Deserialize;

/// Static facts about the running build, stamped onto every record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub target_frame_rate: u32,
    pub version: String,
    pub platform: String,
    pub client_type: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            target_frame_rate: 60,
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            client_type: "native".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Summarize logs/warnings/errors as well as steps. `init` overrides it.
    pub include_log_text: bool,
    /// Production builds merge extra fields silently instead of reporting
    /// reserved-name collisions.
    pub production: bool,
    /// Re-emit every recorded warning/error through `tracing`.
    pub mirror_to_host: bool,
    /// Memory readings at or below this (MB) are treated as noise.
    pub memory_noise_floor_mb: f64,
    pub environment: Environment,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_log_text: false,
            production: !cfg!(debug_assertions),
            mirror_to_host: false,
            memory_noise_floor_mb: 1.0,
            environment: Environment::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
