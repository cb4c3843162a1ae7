//! Clients for the FixPix inference and project backends.
//!
//! [`client`] defines the [`InferenceClient`](client::InferenceClient) and
//! [`ProjectClient`](client::ProjectClient) traits the orchestration layer
//! is written against. [`http`] implements both over HTTP with
//! [`reqwest`], configured from the environment via [`config`].

pub mod client;
pub mod config;
pub mod error;
pub mod http;
