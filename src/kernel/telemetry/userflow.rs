use std::collections::BTreeMap;
use std::time::Duration;

use super::entry::{LogEntry, LogKind};
use super::record::is_reserved;
use super::summary::summarize;
use crate::kernel::error::{FlowError, Result};
use crate::kernel::session::Session;

/// Below this many seconds a flow is too short for a meaningful frame rate.
const MIN_RATE_DURATION_SECS: f64 = 0.01;

/// Running per-tick performance accumulators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerfStats {
    pub sample_count: u64,
    pub frame_time_max: f64,
    pub frame_time_sum: f64,
    pub frame_time_mean: f64,
    pub memory_max: f64,
    pub memory_sum: f64,
    pub memory_mean: f64,
    pub frame_rate: f64,
}

impl PerfStats {
    /// Hot path: called for every open flow on every tick.
    pub fn sample(&mut self, delta_secs: f64, memory_mb: f64) {
        self.sample_count += 1;
        self.frame_time_max = self.frame_time_max.max(delta_secs);
        self.frame_time_sum += delta_secs;
        self.memory_max = self.memory_max.max(memory_mb);
        self.memory_sum += memory_mb;
    }

    fn finalize(&mut self, duration_secs: f64) {
        self.frame_rate = if duration_secs > MIN_RATE_DURATION_SECS {
            self.sample_count as f64 / duration_secs
        } else {
            0.0
        };

        if self.sample_count > 1 {
            let n = self.sample_count as f64;
            self.frame_time_mean = self.frame_time_sum / n;
            self.memory_mean = self.memory_sum / n;
        } else {
            self.frame_time_mean = self.frame_time_sum;
            self.memory_mean = self.memory_sum;
        }
    }
}

/// Summaries derived from the message buffers when a flow ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summaries {
    pub steps: Option<String>,
    pub logs: Option<String>,
    pub warnings: Option<String>,
    pub errors: Option<String>,
}

/// One instance of a named, bracketed unit of work.
///
/// Mutated while open (logging, extra fields, sampling); frozen once
/// `close` has run.
#[derive(Debug, Clone)]
pub struct Userflow {
    pub flow_key: String,
    pub session: Option<Session>,
    pub sequence_number: u64,
    pub is_recorded: bool,
    pub started_during_initial_load: bool,
    pub ended_during_initial_load: bool,
    pub was_paused: bool,
    pub outcome: String,
    pub is_success: bool,
    pub start_time: Duration,
    pub end_time: Option<Duration>,
    pub start_epoch: f64,
    pub end_epoch: Option<f64>,
    pub duration_secs: f64,
    pub perf: PerfStats,
    pub steps: Vec<LogEntry>,
    pub logs: Vec<LogEntry>,
    pub warnings: Vec<LogEntry>,
    pub errors: Vec<LogEntry>,
    pub extra_fields: Option<BTreeMap<String, String>>,
    pub summaries: Summaries,
    /// Never reset, unlike `sequence_number`. Ties queued start records to
    /// their instance across re-init.
    pub(crate) instance_id: u64,
}

impl Userflow {
    pub fn new(
        flow_key: &str,
        session: Option<Session>,
        sequence_number: u64,
        is_recorded: bool,
        during_initial_load: bool,
        start_time: Duration,
        start_epoch: f64,
    ) -> Self {
        Self {
            flow_key: flow_key.to_string(),
            session,
            sequence_number,
            is_recorded,
            started_during_initial_load: during_initial_load,
            ended_during_initial_load: false,
            was_paused: false,
            outcome: String::new(),
            is_success: false,
            start_time,
            end_time: None,
            start_epoch,
            end_epoch: None,
            duration_secs: 0.0,
            perf: PerfStats::default(),
            steps: Vec::new(),
            logs: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            extra_fields: None,
            summaries: Summaries::default(),
            instance_id: 0,
        }
    }

    pub fn push(&mut self, kind: LogKind, entry: LogEntry) {
        match kind {
            LogKind::Step => self.steps.push(entry),
            LogKind::Log => self.logs.push(entry),
            LogKind::Warning => self.warnings.push(entry),
            LogKind::Error => self.errors.push(entry),
        }
    }

    pub fn entries(&self, kind: LogKind) -> &[LogEntry] {
        match kind {
            LogKind::Step => &self.steps,
            LogKind::Log => &self.logs,
            LogKind::Warning => &self.warnings,
            LogKind::Error => &self.errors,
        }
    }

    /// Refuses reserved names; the record keeps the engine's value for those.
    pub fn add_extra_field(&mut self, key: &str, value: &str) -> Result<()> {
        if is_reserved(key) {
            return Err(FlowError::ReservedField {
                flow_key: self.flow_key.clone(),
                key: key.to_string(),
            });
        }
        self.extra_fields
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Stamps the outcome. Every flow gets this, recorded or not.
    pub fn close(&mut self, is_success: bool, outcome: &str, during_initial_load: bool, now: Duration, now_epoch: f64) {
        self.is_success = is_success;
        self.outcome = outcome.to_string();
        self.ended_during_initial_load = during_initial_load;
        self.end_time = Some(now);
        self.end_epoch = Some(now_epoch);
        self.duration_secs = now.saturating_sub(self.start_time).as_secs_f64();
    }

    /// Derived statistics and summaries. Only worth paying for on flows that
    /// will be transmitted.
    pub fn finalize(&mut self, include_log_text: bool) {
        self.perf.finalize(self.duration_secs);

        self.summaries.steps = summarize(&self.steps, self.start_time);
        if include_log_text {
            self.summaries.logs = summarize(&self.logs, self.start_time);
            self.summaries.warnings = summarize(&self.warnings, self.start_time);
            self.summaries.errors = summarize(&self.errors, self.start_time);
        }
    }

    /// `"true"` if the flow lived entirely inside the initial load,
    /// `"after"` if it straddled its end, `"false"` otherwise.
    pub fn initial_load_marker(&self) -> &'static str {
        match (self.started_during_initial_load, self.ended_during_initial_load) {
            (true, true) => "true",
            (true, false) => "after",
            (false, _) => "false",
        }
    }
}
