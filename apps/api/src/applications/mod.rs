// Application pipeline: orchestration, read-side status and the user-facing API.

pub mod handlers;
pub mod orchestrator;
pub mod status;
