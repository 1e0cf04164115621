use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::debug;

/// Which rule decided a sampling outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingSource {
    Simulated,
    Preset,
    Override,
    Default,
}

/// Decides, once per flow instance, whether it is recorded.
///
/// # PRECEDENCE
/// simulated mode > server preset > caller override > always record.
/// A preset can silence a caller that forgot an override and can never be
/// overridden from the call site.
pub struct SamplingController {
    presets: HashMap<String, f64>,
    simulated: bool,
    rng: StdRng,
}

impl SamplingController {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            presets: HashMap::new(),
            simulated: false,
            rng,
        }
    }

    pub fn set_simulated_mode(&mut self, simulated: bool) {
        self.simulated = simulated;
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// Stores or overwrites the server-driven ratio for `flow_key`.
    /// Callers are expected to have validated the range.
    pub fn set_preset(&mut self, flow_key: &str, ratio: f64) {
        self.presets.insert(flow_key.to_string(), ratio);
    }

    pub fn should_record(&mut self, flow_key: &str, override_ratio: Option<f64>) -> bool {
        let (recorded, source) = self.decide(flow_key, override_ratio);
        debug!(target: "userflow", flow_key, recorded, ?source, "sampling decision");
        recorded
    }

    fn decide(&mut self, flow_key: &str, override_ratio: Option<f64>) -> (bool, SamplingSource) {
        if self.simulated {
            return (false, SamplingSource::Simulated);
        }

        if let Some(ratio) = self.presets.get(flow_key).copied() {
            return (self.draw(ratio), SamplingSource::Preset);
        }

        match override_ratio {
            Some(ratio) if !ratio.is_nan() => (self.draw(ratio), SamplingSource::Override),
            _ => (true, SamplingSource::Default),
        }
    }

    fn draw(&mut self, ratio: f64) -> bool {
        self.rng.gen::<f64>() < ratio
    }
}

impl Default for SamplingController {
    fn default() -> Self {
        Self::new()
    }
}
