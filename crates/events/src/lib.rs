//! State-change notifications for the FixPix editing core.
//!
//! Components never expose their state through shared ambient globals;
//! they publish a [`StudioEvent`](bus::StudioEvent) on an
//! [`EventBus`](bus::EventBus) after every transition and callers
//! subscribe to the ones they render.

pub mod bus;
