use std::collections::HashMap;
use std::time::Duration;

use super::userflow::Userflow;
use crate::kernel::memory::MemoryProbe;

/// Per-tick hook feeding frame time and memory into every open flow.
///
/// O(open flows) per tick, no allocation. Memory is only read when at least
/// one flow is open.
pub struct PerfSampler {
    memory: MemoryProbe,
    last_tick: Duration,
}

impl PerfSampler {
    pub fn new(memory: MemoryProbe) -> Self {
        Self {
            memory,
            last_tick: Duration::ZERO,
        }
    }

    pub fn reset(&mut self, now: Duration) {
        self.last_tick = now;
    }

    /// Returns the delta (seconds) that was applied.
    pub fn update(&mut self, now: Duration, open: &mut HashMap<String, Userflow>) -> f64 {
        let delta = now.saturating_sub(self.last_tick).as_secs_f64();
        self.last_tick = now;

        if open.is_empty() {
            return delta;
        }

        let memory_mb = self.memory.read_mb();
        for flow in open.values_mut() {
            flow.perf.sample(delta, memory_mb);
        }
        delta
    }
}
