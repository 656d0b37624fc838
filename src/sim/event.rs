/// Events emitted by the session engine.
/// The presentation layer consumes these for messages and feedback.

use crate::domain::destabilize::Mode;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    ExerciseStarted { index: usize, total: usize },
    AnswerScored { exercise_id: u64, correct: bool },
    /// Decided at submit, applies from the next exercise on.
    EffectQueued { mode: Mode, remaining: u32, carried: bool },
    /// Now governing the keypad.
    EffectActivated { mode: Mode, remaining: u32 },
    SessionFinished { score: i32, total: usize },
}
