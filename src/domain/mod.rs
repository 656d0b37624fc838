//! Pure domain types and rules: no IO, no async, no clocks.

pub mod destabilize;
pub mod exercise;
pub mod grid;
pub mod keypad;
pub mod random;
pub mod shuffle;
