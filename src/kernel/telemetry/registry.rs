use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::entry::{LogEntry, LogKind};
use super::record::{Record, RecordBuilder};
use super::sampler::PerfSampler;
use super::userflow::Userflow;
use crate::kernel::config::EngineConfig;
use crate::kernel::error::{FlowError, Result};
use crate::kernel::memory::{MemoryGauge, MemoryProbe};
use crate::kernel::sampling::SamplingController;
use crate::kernel::session::Session;
use crate::kernel::time::{Clock, SystemClock};

pub const OUTCOME_MISSING_END: &str = "missing_end_flow";
pub const OUTCOME_SESSION_ENDED: &str = "session_ended";
pub const OUTCOME_REINITIALIZED: &str = "reinitialized";

/// Per queue. Past this the oldest pending record is dropped.
pub const MAX_PENDING_RECORDS: usize = 10_000;

/// Owner of every flow instance: the open table keyed by flow key plus the
/// queues of flows waiting to be transmitted.
///
/// # INVARIANT
/// At most one open flow per key. A duplicate start force-ends the stale
/// instance with `missing_end_flow` before the new one exists.
///
/// All operations run on one logical thread. Use `Telemetry` to share an
/// instance.
pub struct FlowRegistry {
    config: EngineConfig,
    clock: Box<dyn Clock>,
    sampler: PerfSampler,
    sampling: SamplingController,

    initialized: bool,
    include_log_text: bool,
    done_with_initial_loading: bool,
    session: Option<Session>,
    next_sequence: u64,
    next_instance: u64,

    open: HashMap<String, Userflow>,
    // (flow key, instance id) of recorded flows whose start is not yet sent
    started: VecDeque<(String, u64)>,
    completed: VecDeque<Userflow>,
    // records evicted since the last drain
    overflowed: usize,
}

impl FlowRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            include_log_text: config.include_log_text,
            config,
            clock: Box::new(SystemClock::new()),
            sampler: PerfSampler::new(MemoryProbe::with_gauge(MemoryGauge::new())),
            sampling: SamplingController::new(),
            initialized: false,
            done_with_initial_loading: false,
            session: None,
            next_sequence: 0,
            next_instance: 0,
            open: HashMap::new(),
            started: VecDeque::new(),
            completed: VecDeque::new(),
            overflowed: 0,
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_memory(mut self, memory: MemoryProbe) -> Self {
        self.sampler = PerfSampler::new(memory);
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingController) -> Self {
        self.sampling = sampling;
        self
    }

    // === Lifecycle ===

    /// (Re)initializes. Ends the active session, then force-ends whatever is
    /// still open with `reinitialized`. Queued records survive.
    pub fn init(&mut self, include_log_text: bool) {
        if self.session.is_some() {
            self.session_end();
        }
        self.force_end_all(OUTCOME_REINITIALIZED);

        self.include_log_text = include_log_text;
        self.done_with_initial_loading = false;
        self.next_sequence = 0;
        self.sampler.reset(self.clock.monotonic());
        self.initialized = true;

        info!(target: "userflow", include_log_text, pending = self.pending_record_count(), "userflow engine initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_simulated_mode(&mut self, simulated: bool) {
        self.sampling.set_simulated_mode(simulated);
    }

    pub fn finished_initial_loading(&mut self) {
        self.done_with_initial_loading = true;
    }

    pub fn is_done_with_initial_loading(&self) -> bool {
        self.done_with_initial_loading
    }

    /// Starts a new session, ending the current one first.
    pub fn session_start(&mut self) -> Option<Uuid> {
        if let Err(err) = self.require_init("session_start") {
            error!(target: "userflow", "{err}");
            return None;
        }
        if self.session.is_some() {
            self.session_end();
        }

        let session = Session::begin(self.clock.epoch_seconds());
        info!(target: "userflow", session_id = %session.id, "session started");
        self.session = Some(session);
        Some(session.id)
    }

    /// Fails every open flow with `session_ended`.
    pub fn session_end(&mut self) {
        self.force_end_all(OUTCOME_SESSION_ENDED);
        if let Some(session) = self.session.take() {
            info!(target: "userflow", session_id = %session.id, "session ended");
        }
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn note_pause_occurred(&mut self) {
        for flow in self.open.values_mut() {
            flow.was_paused = true;
        }
    }

    // === Flows ===

    pub fn flow_start(&mut self, flow_key: &str, sampling_ratio: Option<f64>) {
        if let Err(err) = self.require_init("flow_start") {
            error!(target: "userflow", flow_key, "{err}");
            return;
        }

        if self.open.contains_key(flow_key) {
            warn!(target: "userflow", flow_key, "flow started twice without an end");
            self.flow_end(flow_key, false, OUTCOME_MISSING_END);
        }

        let is_recorded = self.sampling.should_record(flow_key, sampling_ratio);
        self.next_sequence += 1;
        self.next_instance += 1;

        let mut flow = Userflow::new(
            flow_key,
            self.session,
            self.next_sequence,
            is_recorded,
            !self.done_with_initial_loading,
            self.clock.monotonic(),
            self.clock.epoch_seconds(),
        );
        flow.instance_id = self.next_instance;

        if is_recorded {
            if self.started.len() >= MAX_PENDING_RECORDS {
                self.started.pop_front();
                self.note_overflow();
            }
            self.started.push_back((flow_key.to_string(), flow.instance_id));
        }
        self.open.insert(flow_key.to_string(), flow);
    }

    /// Ends the open flow for `flow_key`. `None` if nothing is open under
    /// that key, which is normal after a forced end.
    pub fn flow_end(&mut self, flow_key: &str, is_success: bool, outcome: &str) -> Option<Userflow> {
        if let Err(err) = self.require_init("flow_end") {
            error!(target: "userflow", flow_key, "{err}");
            return None;
        }

        let mut flow = self.open.remove(flow_key)?;
        flow.close(
            is_success,
            outcome,
            !self.done_with_initial_loading,
            self.clock.monotonic(),
            self.clock.epoch_seconds(),
        );

        if flow.is_recorded {
            flow.finalize(self.include_log_text);
            if self.completed.len() >= MAX_PENDING_RECORDS {
                self.completed.pop_front();
                self.note_overflow();
            }
            self.completed.push_back(flow.clone());
        }
        debug!(target: "userflow", flow_key, is_success, outcome, recorded = flow.is_recorded, "flow ended");
        Some(flow)
    }

    pub fn is_userflow_active(&self, flow_key: &str) -> bool {
        self.open.contains_key(flow_key)
    }

    pub fn open_flow_count(&self) -> usize {
        self.open.len()
    }

    /// Server-driven sampling preset. Always beats a call-site ratio.
    pub fn set_flow_sampling(&mut self, flow_key: &str, ratio: f64) {
        match validate_ratio(ratio) {
            Ok(ratio) => self.sampling.set_preset(flow_key, ratio),
            Err(err) if ratio.is_nan() => {
                warn!(target: "userflow", flow_key, "{err}; preset ignored");
            }
            Err(err) => {
                warn!(target: "userflow", flow_key, "{err}; clamped");
                self.sampling.set_preset(flow_key, ratio.clamp(0.0, 1.0));
            }
        }
    }

    fn force_end_all(&mut self, outcome: &str) {
        let keys: Vec<String> = self.open.keys().cloned().collect();
        for key in keys {
            self.flow_end(&key, false, outcome);
        }
    }

    // === Logging ===

    pub fn log_step(&mut self, step: &str, flow_key: &str) {
        self.log(LogKind::Step, step, Some(flow_key));
    }

    pub fn log_message(&mut self, message: &str, flow_key: Option<&str>) {
        self.log(LogKind::Log, message, flow_key);
    }

    pub fn log_warning(&mut self, message: &str, flow_key: Option<&str>) {
        self.log(LogKind::Warning, message, flow_key);
    }

    pub fn log_error(&mut self, message: &str, flow_key: Option<&str>) {
        self.log(LogKind::Error, message, flow_key);
    }

    /// Appends to one flow when `flow_key` is given, otherwise to every
    /// flow open right now.
    pub fn log(&mut self, kind: LogKind, message: &str, flow_key: Option<&str>) {
        if let Err(err) = self.require_init(log_op_name(kind)) {
            error!(target: "userflow", "{err}");
            return;
        }

        let entry = LogEntry::new(message, self.clock.monotonic());
        match flow_key {
            Some(key) => {
                if let Some(flow) = self.open.get_mut(key) {
                    flow.push(kind, entry);
                }
            }
            None => {
                for flow in self.open.values_mut() {
                    flow.push(kind, entry.clone());
                }
            }
        }

        if self.config.mirror_to_host {
            let flow = flow_key.unwrap_or("*");
            match kind {
                LogKind::Warning => warn!(target: "userflow", flow, "{message}"),
                LogKind::Error => error!(target: "userflow", flow, "{message}"),
                LogKind::Step | LogKind::Log => debug!(target: "userflow", flow, "{message}"),
            }
        }
    }

    pub fn add_extra_field_to_flow(&mut self, flow_key: &str, key: &str, value: &str) {
        let production = self.config.production;
        match self.open_flow_mut(flow_key) {
            Ok(flow) => {
                if let Err(err) = flow.add_extra_field(key, value) {
                    report_collision(production, &err);
                }
            }
            Err(err) => debug!(target: "userflow", "{err}; extra field `{key}` dropped"),
        }
    }

    pub fn add_extra_fields_to_flow(&mut self, flow_key: &str, fields: &BTreeMap<String, String>) {
        let production = self.config.production;
        match self.open_flow_mut(flow_key) {
            Ok(flow) => {
                for (key, value) in fields {
                    if let Err(err) = flow.add_extra_field(key, value) {
                        report_collision(production, &err);
                    }
                }
            }
            Err(err) => debug!(target: "userflow", "{err}; {} extra fields dropped", fields.len()),
        }
    }

    // === Tick ===

    /// Once per host tick.
    pub fn static_update(&mut self) {
        if !self.initialized {
            return;
        }
        let now = self.clock.monotonic();
        self.sampler.update(now, &mut self.open);
    }

    // === Transmission ===

    /// Drains both queues into records: every pending start, then every
    /// pending end. A second call without new activity returns nothing.
    pub fn get_userflow_transmission_list(&mut self) -> Vec<Record> {
        if self.overflowed > 0 {
            warn!(target: "userflow", dropped = self.overflowed, "transmission queues overflowed since last drain");
            self.overflowed = 0;
        }

        let builder = RecordBuilder::new(&self.config);
        let mut records = Vec::with_capacity(self.started.len() + self.completed.len());

        let ended: HashMap<u64, usize> = self
            .completed
            .iter()
            .enumerate()
            .map(|(i, flow)| (flow.instance_id, i))
            .collect();

        for (key, instance) in self.started.drain(..) {
            let flow = self
                .open
                .get(&key)
                .filter(|f| f.instance_id == instance)
                .or_else(|| ended.get(&instance).and_then(|&i| self.completed.get(i)));
            match flow {
                Some(flow) => records.push(builder.start_record(flow)),
                // Its end record was evicted
                None => debug!(target: "userflow", flow_key = %key, "queued start lost its flow"),
            }
        }

        for flow in self.completed.drain(..) {
            records.push(builder.end_record(&flow));
        }
        records
    }

    pub fn pending_record_count(&self) -> usize {
        self.started.len() + self.completed.len()
    }

    // === Internals ===

    fn note_overflow(&mut self) {
        if self.overflowed == 0 {
            warn!(target: "userflow", cap = MAX_PENDING_RECORDS, "transmission queue full; dropping oldest records");
        }
        self.overflowed += 1;
    }

    fn require_init(&self, op: &'static str) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(FlowError::NotInitialized(op))
        }
    }

    fn open_flow_mut(&mut self, flow_key: &str) -> Result<&mut Userflow> {
        self.open
            .get_mut(flow_key)
            .ok_or_else(|| FlowError::UnknownFlow(flow_key.to_string()))
    }
}

fn validate_ratio(ratio: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(FlowError::InvalidRatio(ratio))
    }
}

/// A reserved-name collision is a caller bug: loud in development, quiet in
/// production where it would only spam the host log.
fn report_collision(production: bool, err: &FlowError) {
    if production {
        debug!(target: "userflow", "{err}; caller value dropped");
    } else {
        error!(target: "userflow", "{err}; caller value dropped");
    }
}

fn log_op_name(kind: LogKind) -> &'static str {
    match kind {
        LogKind::Step => "log_step",
        LogKind::Log => "log_message",
        LogKind::Warning => "log_warning",
        LogKind::Error => "log_error",
    }
}
