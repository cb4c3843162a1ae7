//! Async orchestration for the FixPix editing core.
//!
//! - [`orchestrator::EditPipeline`] runs the fixed stage sequence over one
//!   image under a single-flight lock.
//! - [`batch::BatchQueue`] feeds queued images through a pipeline one at a
//!   time with cooperative cancellation.
//! - [`generation::GenerationPoller`] drives text-to-image jobs to
//!   completion or timeout.
//! - [`session::EditorSession`] ties them to the settings history and the
//!   project backend.

pub mod batch;
pub mod error;
pub mod generation;
mod guard;
pub mod orchestrator;
pub mod session;
pub mod stage;
