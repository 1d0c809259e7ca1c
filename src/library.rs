//! Track catalog: the playlist model, its loader and the ordered registry
//! the controller indexes into.

mod model;
mod playlist;
mod registry;

pub use model::Track;
pub use playlist::load_playlist;
pub use registry::TrackRegistry;

#[cfg(test)]
mod tests;
