//! Orchestration logic: per-request pipeline state and the
//! end-to-end driver.

pub mod orchestrator;
pub mod request;

pub use orchestrator::{Orchestrator, StageError};
pub use request::{
    chunk_text, preview, InboundMessage, InboundPayload, PipelineRequest, SourceKind, Stage,
    MAX_REPLY_CHARS, PREVIEW_CHARS,
};
