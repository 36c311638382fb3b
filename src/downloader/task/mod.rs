//! Per-job worker -- admission, transfer, extraction and finalization.
//!
//! Split into focused submodules:
//! - [`context`] - Shared per-job state and the registry guard
//! - [`orchestration`] - Validation, gate admission, transfer and extraction phases
//! - [`finalization`] - Terminal status, cleanup, callbacks and grace delay

mod context;
mod finalization;
mod orchestration;

pub(crate) use context::JobContext;
pub(crate) use orchestration::run_job;
