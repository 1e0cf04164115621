//! Userflow telemetry: bracketed flows, per-tick performance sampling,
//! bounded summaries and transmission records.
//!
//! # OWNERSHIP
//! `FlowRegistry` owns every flow. Callers address flows by key only; the
//! value returned from `flow_end` is a detached copy.
//!
//! # PAYLOAD INVARIANT
//! No string field handed to the transmitter exceeds `MAX_FIELD_LENGTH`
//! characters, and reserved field names are never overwritten by caller
//! extra fields.

pub mod entry;
pub mod handle;
pub mod layer;
pub mod record;
pub mod registry;
pub mod sampler;
pub mod summary;
pub mod userflow;
