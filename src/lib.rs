//! pixelcalc: a mental-arithmetic drill whose keypad fights back.
//!
//! `domain` holds the pure pieces (exercises, keypad layouts, the
//! destabilization controller, seeded shuffles). `sim` runs a session
//! against its collaborators and animates the score reveal.

pub mod config;
pub mod domain;
pub mod error;
pub mod sim;
