use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Readings below this many MB are considered degenerate.
pub const MIN_VALID_MEMORY_MB: f64 = 1.0;

pub trait MemorySource: Send {
    fn read_mb(&mut self) -> f64;
}

/// Host-reported memory figure (managed heap, allocator stats...).
/// The host writes, the sampler reads. Zero until the host reports.
#[derive(Debug, Clone, Default)]
pub struct MemoryGauge {
    bits: Arc<AtomicU64>,
}

impl MemoryGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_mb(&self, mb: f64) {
        self.bits.store(mb.to_bits(), Ordering::Relaxed);
    }

    pub fn current_mb(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl MemorySource for MemoryGauge {
    fn read_mb(&mut self) -> f64 {
        self.current_mb()
    }
}

/// Resident set size of this process, via `sysinfo`.
pub struct ResidentMemory {
    system: System,
    pid: Pid,
}

impl ResidentMemory {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(std::process::id()),
        }
    }
}

impl Default for ResidentMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource for ResidentMemory {
    fn read_mb(&mut self) -> f64 {
        let pid = self.pid;
        self.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
        match self.system.process(pid) {
            Some(process) => process.memory() as f64 / 1024.0 / 1024.0,
            None => 0.0,
        }
    }
}

/// Constant reading. Used by tests and headless hosts.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory(pub f64);

impl MemorySource for FixedMemory {
    fn read_mb(&mut self) -> f64 {
        self.0
    }
}

/// Primary source with an OS-level fallback for degenerate readings.
pub struct MemoryProbe {
    primary: Box<dyn MemorySource>,
    fallback: Box<dyn MemorySource>,
}

impl MemoryProbe {
    pub fn new(primary: Box<dyn MemorySource>, fallback: Box<dyn MemorySource>) -> Self {
        Self { primary, fallback }
    }

    /// Gauge first, resident memory when the host has not reported.
    pub fn with_gauge(gauge: MemoryGauge) -> Self {
        Self::new(Box::new(gauge), Box::new(ResidentMemory::new()))
    }

    pub fn read_mb(&mut self) -> f64 {
        let primary = self.primary.read_mb();
        if primary < MIN_VALID_MEMORY_MB {
            self.fallback.read_mb()
        } else {
            primary
        }
    }
}
