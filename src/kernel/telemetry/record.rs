use serde::Serialize;
use std::collections::BTreeMap;

use super::entry::LogKind;
use super::summary::clipped;
use super::userflow::Userflow;
use crate::kernel::config::{EngineConfig, Environment};

/// Longest string value the transmitter accepts for a single field.
pub const MAX_FIELD_LENGTH: usize = 1024;

pub const RECORD_TYPE: &str = "Userflow";

pub mod field {
    pub const FLOW_KEY: &str = "flow_key";
    pub const FLOW_STATE: &str = "flow_state";
    pub const FLOW_SEQ: &str = "flow_seq";
    pub const SESSION_ID: &str = "session_id";
    pub const SESSION_START: &str = "session_start";
    pub const START_TIME: &str = "start_time";
    pub const END_TIME: &str = "end_time";
    pub const DURATION: &str = "duration";
    pub const SUCCESS: &str = "success";
    pub const OUTCOME: &str = "outcome";
    pub const SAMPLE_COUNT: &str = "sample_count";
    pub const WAS_PAUSED: &str = "was_paused";
    pub const MEM_MAX: &str = "mem_max";
    pub const MEM_MEAN: &str = "mem_mean";
    pub const FRAME_MAX: &str = "frame_max";
    pub const FRAME_MEAN: &str = "frame_mean";
    pub const FRAME_RATE: &str = "frame_rate";
    pub const STEP_COUNT: &str = "step_count";
    pub const LOG_COUNT: &str = "log_count";
    pub const WARNING_COUNT: &str = "warning_count";
    pub const ERROR_COUNT: &str = "error_count";
    pub const STEPS: &str = "steps";
    pub const LOGS: &str = "logs";
    pub const WARNINGS: &str = "warnings";
    pub const ERRORS: &str = "errors";
    pub const INITIAL_LOAD: &str = "initial_load";
    pub const TARGET_FRAME_RATE: &str = "target_frame_rate";
    pub const VERSION: &str = "version";
    pub const PLATFORM: &str = "platform";
    pub const CLIENT_TYPE: &str = "client_type";
}

/// Names the engine owns. Caller extra fields may never replace them.
pub const RESERVED_FIELDS: &[&str] = &[
    field::FLOW_KEY,
    field::FLOW_STATE,
    field::FLOW_SEQ,
    field::SESSION_ID,
    field::SESSION_START,
    field::START_TIME,
    field::END_TIME,
    field::DURATION,
    field::SUCCESS,
    field::OUTCOME,
    field::SAMPLE_COUNT,
    field::WAS_PAUSED,
    field::MEM_MAX,
    field::MEM_MEAN,
    field::FRAME_MAX,
    field::FRAME_MEAN,
    field::FRAME_RATE,
    field::STEP_COUNT,
    field::LOG_COUNT,
    field::WARNING_COUNT,
    field::ERROR_COUNT,
    field::STEPS,
    field::LOGS,
    field::WARNINGS,
    field::ERRORS,
    field::INITIAL_LOAD,
    field::TARGET_FRAME_RATE,
    field::VERSION,
    field::PLATFORM,
    field::CLIENT_TYPE,
];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_FIELDS.contains(&key)
}

/// Generic record handed to the external transmitter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub fields: BTreeMap<String, String>,
}

impl Record {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Turns flow snapshots into transmission records.
///
/// Every value is bounded to `MAX_FIELD_LENGTH` on the way out, whatever its
/// source (outcome, extra fields, summaries).
pub struct RecordBuilder<'a> {
    environment: &'a Environment,
    noise_floor_mb: f64,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            environment: &config.environment,
            noise_floor_mb: config.memory_noise_floor_mb,
        }
    }

    pub fn start_record(&self, flow: &Userflow) -> Record {
        let mut fields = self.common_fields(flow, "start");
        merge_extra_fields(&mut fields, flow);
        Record {
            kind: RECORD_TYPE.to_string(),
            name: format!("start-{}", flow.flow_key),
            fields: bounded(fields),
        }
    }

    pub fn end_record(&self, flow: &Userflow) -> Record {
        let mut fields = self.common_fields(flow, "end");
        let mut put = |key: &str, value: String| {
            fields.insert(key.to_string(), value);
        };

        put(field::SUCCESS, flow.is_success.to_string());
        if !flow.outcome.is_empty() {
            put(field::OUTCOME, flow.outcome.clone());
        }
        if let Some(end) = flow.end_epoch {
            put(field::END_TIME, format!("{:.2}", end));
        }
        put(field::DURATION, format!("{:.2}", flow.duration_secs));
        put(field::WAS_PAUSED, flow.was_paused.to_string());
        put(field::INITIAL_LOAD, flow.initial_load_marker().to_string());

        let perf = &flow.perf;
        put(field::SAMPLE_COUNT, perf.sample_count.to_string());
        if perf.memory_max > self.noise_floor_mb {
            put(field::MEM_MAX, format!("{:.2}", perf.memory_max));
        }
        if perf.memory_mean > self.noise_floor_mb {
            put(field::MEM_MEAN, format!("{:.2}", perf.memory_mean));
        }
        put(field::FRAME_MAX, format!("{:.3}", perf.frame_time_max));
        put(field::FRAME_MEAN, format!("{:.3}", perf.frame_time_mean));
        put(field::FRAME_RATE, format!("{:.2}", perf.frame_rate));

        put(field::STEP_COUNT, flow.entries(LogKind::Step).len().to_string());
        put(field::LOG_COUNT, flow.entries(LogKind::Log).len().to_string());
        put(field::WARNING_COUNT, flow.entries(LogKind::Warning).len().to_string());
        put(field::ERROR_COUNT, flow.entries(LogKind::Error).len().to_string());

        let summaries = [
            (field::STEPS, &flow.summaries.steps),
            (field::LOGS, &flow.summaries.logs),
            (field::WARNINGS, &flow.summaries.warnings),
            (field::ERRORS, &flow.summaries.errors),
        ];
        for (key, summary) in summaries {
            if let Some(text) = summary {
                put(key, text.clone());
            }
        }

        merge_extra_fields(&mut fields, flow);
        Record {
            kind: RECORD_TYPE.to_string(),
            name: format!("end-{}", flow.flow_key),
            fields: bounded(fields),
        }
    }

    fn common_fields(&self, flow: &Userflow, state: &str) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert(field::FLOW_KEY.to_string(), flow.flow_key.clone());
        fields.insert(field::FLOW_STATE.to_string(), state.to_string());
        fields.insert(field::FLOW_SEQ.to_string(), flow.sequence_number.to_string());
        if let Some(session) = &flow.session {
            fields.insert(field::SESSION_ID.to_string(), session.id.to_string());
            fields.insert(field::SESSION_START.to_string(), format!("{:.2}", session.started_at));
        }
        fields.insert(field::START_TIME.to_string(), format!("{:.2}", flow.start_epoch));

        let env = self.environment;
        fields.insert(field::TARGET_FRAME_RATE.to_string(), env.target_frame_rate.to_string());
        fields.insert(field::VERSION.to_string(), env.version.clone());
        fields.insert(field::PLATFORM.to_string(), env.platform.clone());
        fields.insert(field::CLIENT_TYPE.to_string(), env.client_type.clone());
        fields
    }
}

/// Copies the flow's extra fields in. Reserved names keep the engine value;
/// the caller was already told when the field was added.
fn merge_extra_fields(fields: &mut BTreeMap<String, String>, flow: &Userflow) {
    let Some(extra) = &flow.extra_fields else {
        return;
    };
    for (key, value) in extra {
        if !is_reserved(key) {
            fields.insert(key.clone(), value.clone());
        }
    }
}

fn bounded(mut fields: BTreeMap<String, String>) -> BTreeMap<String, String> {
    for value in fields.values_mut() {
        if let Some(short) = clipped(value) {
            *value = short;
        }
    }
    fields
}
