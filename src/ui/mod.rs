//! Terminal host: crossterm input mapping and the diff-based renderer.

pub mod input;
pub mod renderer;
