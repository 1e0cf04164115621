use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A coarse grouping (one app launch, one login) that every flow started
/// while it is current is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Wall-clock start, epoch seconds.
    pub started_at: f64,
}

impl Session {
    pub fn begin(started_at: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
        }
    }
}
