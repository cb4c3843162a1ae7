//! Domain types and pure logic for the FixPix editing core.
//!
//! Everything in this crate is free of I/O: settings and their history,
//! queue statuses, generation status messages, and upload validation.
//! The async orchestration built on top of it lives in `fixpix-pipeline`.

pub mod batch;
pub mod error;
pub mod generation;
pub mod history;
pub mod project;
pub mod settings;
pub mod types;
pub mod upload;
