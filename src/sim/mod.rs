//! Session orchestration: the exercise state machine, the score reveal and
//! the ports it talks through.

pub mod animator;
pub mod driver;
pub mod event;
pub mod local;
pub mod ports;
pub mod reveal;
pub mod session;
