use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use super::entry::LogKind;
use super::record::Record;
use super::registry::FlowRegistry;
use super::userflow::Userflow;
use crate::kernel::guard::ReentrancyGuard;

/// Cloneable, thread-safe front for a `FlowRegistry`.
///
/// Every call takes this instance's reentrancy guard before the lock. A call
/// made from inside another call to the same instance on the same thread (a
/// `tracing` layer feeding an error back in, a crash hook) is dropped instead
/// of recursing or deadlocking on the mutex. Calls from other threads simply
/// wait, and other instances are never blocked.
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<Mutex<FlowRegistry>>,
}

impl Telemetry {
    pub fn new(registry: FlowRegistry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    /// Identity shared by every clone of this handle.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Runs `f` against the registry, or returns `None` for a nested call.
    pub fn with<R>(&self, f: impl FnOnce(&mut FlowRegistry) -> R) -> Option<R> {
        let _guard = ReentrancyGuard::enter(self.id())?;
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut registry))
    }

    pub fn init(&self, include_log_text: bool) {
        self.with(|r| r.init(include_log_text));
    }

    pub fn is_initialized(&self) -> bool {
        self.with(|r| r.is_initialized()).unwrap_or(false)
    }

    pub fn set_simulated_mode(&self, simulated: bool) {
        self.with(|r| r.set_simulated_mode(simulated));
    }

    pub fn finished_initial_loading(&self) {
        self.with(|r| r.finished_initial_loading());
    }

    pub fn is_done_with_initial_loading(&self) -> bool {
        self.with(|r| r.is_done_with_initial_loading()).unwrap_or(false)
    }

    pub fn session_start(&self) -> Option<Uuid> {
        self.with(|r| r.session_start()).flatten()
    }

    pub fn session_end(&self) {
        self.with(|r| r.session_end());
    }

    pub fn flow_start(&self, flow_key: &str, sampling_ratio: Option<f64>) {
        self.with(|r| r.flow_start(flow_key, sampling_ratio));
    }

    pub fn flow_end(&self, flow_key: &str, is_success: bool, outcome: &str) -> Option<Userflow> {
        self.with(|r| r.flow_end(flow_key, is_success, outcome)).flatten()
    }

    pub fn is_userflow_active(&self, flow_key: &str) -> bool {
        self.with(|r| r.is_userflow_active(flow_key)).unwrap_or(false)
    }

    pub fn set_flow_sampling(&self, flow_key: &str, ratio: f64) {
        self.with(|r| r.set_flow_sampling(flow_key, ratio));
    }

    pub fn log_step(&self, step: &str, flow_key: &str) {
        self.log(LogKind::Step, step, Some(flow_key));
    }

    pub fn log_message(&self, message: &str, flow_key: Option<&str>) {
        self.log(LogKind::Log, message, flow_key);
    }

    pub fn log_warning(&self, message: &str, flow_key: Option<&str>) {
        self.log(LogKind::Warning, message, flow_key);
    }

    pub fn log_error(&self, message: &str, flow_key: Option<&str>) {
        self.log(LogKind::Error, message, flow_key);
    }

    pub fn log(&self, kind: LogKind, message: &str, flow_key: Option<&str>) {
        self.with(|r| r.log(kind, message, flow_key));
    }

    pub fn add_extra_field_to_flow(&self, flow_key: &str, key: &str, value: &str) {
        self.with(|r| r.add_extra_field_to_flow(flow_key, key, value));
    }

    pub fn add_extra_fields_to_flow(&self, flow_key: &str, fields: &BTreeMap<String, String>) {
        self.with(|r| r.add_extra_fields_to_flow(flow_key, fields));
    }

    pub fn note_pause_occurred(&self) {
        self.with(|r| r.note_pause_occurred());
    }

    pub fn static_update(&self) {
        self.with(|r| r.static_update());
    }

    pub fn get_userflow_transmission_list(&self) -> Vec<Record> {
        self.with(|r| r.get_userflow_transmission_list()).unwrap_or_default()
    }
}
