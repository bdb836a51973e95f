//! Controller layer: panel state, view generations and post-action refresh.

pub mod events;
pub mod panel;
