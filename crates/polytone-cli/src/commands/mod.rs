//! CLI command implementations.

pub mod common;
pub mod envelope;
pub mod lfo;
pub mod morphs;
pub mod play;
