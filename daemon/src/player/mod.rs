//! Media playback: engines, adapters, the coordinator and its actor.

mod adapter;
mod coordinator;
mod engine;
mod native;
mod publisher;
mod service;
mod timer;
mod universal;

#[cfg(feature = "video")]
mod gst;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::CoordinatorSettings;
pub use engine::default_factory;
pub use service::{PlayerCommand, PlayerHandle, spawn};
