//! Headless batch worker: runs the edit pipeline over image files.

pub mod config;
pub mod runner;
