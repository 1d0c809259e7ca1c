//! Application module: the model behind the terminal front-end.
//!
//! `App` holds the cursor over the track registry and the last state
//! snapshot published by the engine.

mod model;

pub use model::*;

#[cfg(test)]
mod tests;
