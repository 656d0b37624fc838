/// Exercises and the records a session produces about them.
///
/// All of these are immutable values: an `Exercise` is created by the
/// provisioning collaborator and never mutated; a `SubmissionRecord` is
/// created once per submit and only ever appended to the session log.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Operation {
    Addition,
    Subtraction,
    Multiplication,
}

impl Operation {
    pub fn symbol(self) -> char {
        match self {
            Operation::Addition => '+',
            Operation::Subtraction => '-',
            Operation::Multiplication => '×',
        }
    }

    pub fn apply(self, left: i64, right: i64) -> i64 {
        match self {
            Operation::Addition => left + right,
            Operation::Subtraction => left - right,
            Operation::Multiplication => left * right,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: u64,
    pub operator_left: i64,
    pub operator_right: i64,
    pub operation: Operation,
    pub expected_solution: i64,
}

impl Exercise {
    /// Build an exercise whose solution is computed from its operands.
    pub fn new(id: u64, left: i64, right: i64, operation: Operation) -> Self {
        Exercise {
            id,
            operator_left: left,
            operator_right: right,
            operation,
            expected_solution: operation.apply(left, right),
        }
    }

    /// Exact comparison; arithmetic results are integers, no tolerance.
    pub fn is_solved_by(&self, answer: Option<i64>) -> bool {
        answer == Some(self.expected_solution)
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.operator_left, self.operation.symbol(), self.operator_right)
    }
}

/// One submit, as logged to the observation collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub exercise_id: u64,
    /// `None` when the raw input did not parse as a number.
    pub proposed_answer: Option<i64>,
    pub elapsed_seconds: u64,
    pub is_correct: bool,
}

/// A wrong answer, kept for the results/review view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedExercise {
    pub exercise_id: u64,
    pub operation: Operation,
    pub operator_left: i64,
    pub operator_right: i64,
    pub expected: i64,
    pub given: Option<i64>,
}

impl MissedExercise {
    pub fn from_exercise(exercise: &Exercise, given: Option<i64>) -> Self {
        MissedExercise {
            exercise_id: exercise.id,
            operation: exercise.operation,
            operator_left: exercise.operator_left,
            operator_right: exercise.operator_right,
            expected: exercise.expected_solution,
            given,
        }
    }
}

/// Parse raw keypad text into a proposed answer.
///
/// Only a plain (optionally signed) integer counts. Empty text, decimals,
/// overflow and anything else are `None` and score as a wrong answer.
pub fn parse_answer(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solution_is_computed_from_operands() {
        assert_eq!(Exercise::new(1, 2, 2, Operation::Addition).expected_solution, 4);
        assert_eq!(Exercise::new(2, 5, 3, Operation::Subtraction).expected_solution, 2);
        assert_eq!(Exercise::new(3, 3, 3, Operation::Multiplication).expected_solution, 9);
        assert_eq!(Exercise::new(4, 3, 8, Operation::Subtraction).expected_solution, -5);
    }

    #[test]
    fn display_uses_operation_symbol() {
        assert_eq!(Exercise::new(1, 7, 6, Operation::Multiplication).to_string(), "7 × 6");
        assert_eq!(Exercise::new(1, 12, 4, Operation::Subtraction).to_string(), "12 - 4");
    }

    #[test]
    fn parse_accepts_only_integers() {
        assert_eq!(parse_answer("42"), Some(42));
        assert_eq!(parse_answer("-5"), Some(-5));
        assert_eq!(parse_answer("007"), Some(7));
        assert_eq!(parse_answer(""), None);
        assert_eq!(parse_answer("4.5"), None);
        assert_eq!(parse_answer("abc"), None);
        assert_eq!(parse_answer("99999999999999999999999"), None);
    }

    #[test]
    fn exact_string_of_solution_is_correct() {
        for ex in [
            Exercise::new(1, 2, 2, Operation::Addition),
            Exercise::new(2, 5, 9, Operation::Subtraction),
            Exercise::new(3, 12, 12, Operation::Multiplication),
        ] {
            let exact = ex.expected_solution.to_string();
            assert!(ex.is_solved_by(parse_answer(&exact)));
            let off = (ex.expected_solution + 1).to_string();
            assert!(!ex.is_solved_by(parse_answer(&off)));
            assert!(!ex.is_solved_by(parse_answer("x")));
        }
    }
}
