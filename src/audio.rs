//! Playback engine.
//!
//! The engine runs on its own thread (`thread.rs`) around a `Controller`,
//! which drives the `AudioGraph` (device, voice, reverb routing), the
//! progress sampler and the retry handler. `AudioPlayer` is the handle the
//! front-end holds.

mod controller;
mod convolver;
mod fetch;
mod graph;
mod impulse;
mod loader;
mod mix;
mod player;
mod progress;
mod retry;
mod thread;
mod types;

pub use player::AudioPlayer;
pub use progress::format_elapsed;
pub use types::{EngineCmd, EngineState, Status};
