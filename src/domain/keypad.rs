/// Keypad: 3×4 pad, 10 digit slots + 2 fixed action slots.
///
/// ```text
///   ┌───┬───┬───┐
///   │ 0 │ 1 │ 2 │     slots 0..=8 and 10 hold digits
///   ├───┼───┼───┤     slot 9  = Erase  (never moves, never hidden)
///   │ 3 │ 4 │ 5 │     slot 11 = Submit (never moves, never hidden)
///   ├───┼───┼───┤
///   │ 6 │ 7 │ 8 │     base digit order: 4 8 2 / 5 0 1 / 7 6 3 / · 9 ·
///   ├───┼───┼───┤
///   │ 9 │10 │11 │
///   └───┴───┴───┘
/// ```
///
/// The layout is derived data: recomputed once per exercise transition from
/// the active destabilization mode, then held fixed while that exercise is
/// being answered.

use super::destabilize::Mode;
use super::random::RandomSource;
use super::shuffle;

pub const SLOT_COUNT: usize = 12;
pub const COLS: usize = 3;
pub const ERASE_INDEX: usize = 9;
pub const SUBMIT_INDEX: usize = 11;
pub const DIGIT_SLOTS: [usize; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 10];
pub const BASE_ORDER: [u8; 10] = [4, 8, 2, 5, 0, 1, 7, 6, 3, 9];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Key {
    Digit(u8),
    Erase,
    Submit,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KeypadSlot {
    pub key: Key,
    /// Visual label suppressed (Hide). Never set on action slots.
    pub hidden: bool,
}

impl KeypadSlot {
    /// What to draw on the key face. `None` = blank face.
    pub fn visual_label(&self) -> Option<String> {
        if self.hidden { return None; }
        Some(match self.key {
            Key::Digit(d) => d.to_string(),
            Key::Erase => "••".to_string(),
            Key::Submit => "•".to_string(),
        })
    }

    /// Accessibility label. Always available, even when the face is hidden.
    pub fn accessibility_label(&self) -> String {
        match self.key {
            Key::Digit(d) => format!("Digit {d}"),
            Key::Erase => "Erase".to_string(),
            Key::Submit => "Submit".to_string(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KeypadLayout {
    slots: [KeypadSlot; SLOT_COUNT],
}

impl KeypadLayout {
    fn from_digits(digits: &[u8; 10], hidden: bool) -> Self {
        let blank = KeypadSlot { key: Key::Erase, hidden: false };
        let mut slots = [blank; SLOT_COUNT];
        slots[ERASE_INDEX] = KeypadSlot { key: Key::Erase, hidden: false };
        slots[SUBMIT_INDEX] = KeypadSlot { key: Key::Submit, hidden: false };
        for (&slot, &d) in DIGIT_SLOTS.iter().zip(digits.iter()) {
            slots[slot] = KeypadSlot { key: Key::Digit(d), hidden };
        }
        KeypadLayout { slots }
    }

    pub fn slot(&self, index: usize) -> Option<&KeypadSlot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[KeypadSlot; SLOT_COUNT] {
        &self.slots
    }

    /// Digits in slot order (the 10 digit slots only).
    pub fn digit_order(&self) -> [u8; 10] {
        let mut out = [0u8; 10];
        for (i, &slot) in DIGIT_SLOTS.iter().enumerate() {
            if let Key::Digit(d) = self.slots[slot].key {
                out[i] = d;
            }
        }
        out
    }

    pub fn any_hidden(&self) -> bool {
        self.slots.iter().any(|s| s.hidden)
    }
}

impl Default for KeypadLayout {
    fn default() -> Self {
        KeypadLayout::from_digits(&BASE_ORDER, false)
    }
}

/// Computes the pad for the current mode.
#[derive(Clone, Debug)]
pub struct KeypadLayoutEngine {
    base: [u8; 10],
}

impl KeypadLayoutEngine {
    pub fn new() -> Self {
        KeypadLayoutEngine { base: BASE_ORDER }
    }

    /// Layout for one exercise. Shuffle draws a fresh seed on every call,
    /// so consecutive Shuffle exercises get different orderings.
    pub fn layout(&self, mode: Option<Mode>, rng: &mut dyn RandomSource) -> KeypadLayout {
        match mode {
            None => KeypadLayout::from_digits(&self.base, false),
            Some(Mode::Hide) => KeypadLayout::from_digits(&self.base, true),
            Some(Mode::Shuffle) => self.shuffled(rng.next_seed()),
        }
    }

    /// Shuffled layout for an explicit seed.
    pub fn shuffled(&self, seed: u64) -> KeypadLayout {
        let mut digits = self.base;
        shuffle::permute_in_place(&mut digits, seed);
        KeypadLayout::from_digits(&digits, false)
    }
}

impl Default for KeypadLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ── Answer display ──

/// The pad's display line: digits append, erase pops, submit takes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnswerBuffer {
    text: String,
}

/// Longest answer the display accepts (products stay well below this).
const MAX_ANSWER_LEN: usize = 9;

impl AnswerBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Apply a slot press. Returns the submitted text on `Submit`.
    pub fn press(&mut self, key: Key) -> Option<String> {
        match key {
            Key::Digit(d) => {
                if self.text.len() < MAX_ANSWER_LEN {
                    self.text.push(char::from(b'0' + d));
                }
                None
            }
            Key::Erase => {
                self.text.pop();
                None
            }
            Key::Submit => Some(std::mem::take(&mut self.text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::random::ScriptedRandom;

    fn assert_actions_fixed(layout: &KeypadLayout) {
        assert_eq!(layout.slot(ERASE_INDEX).map(|s| s.key), Some(Key::Erase));
        assert_eq!(layout.slot(SUBMIT_INDEX).map(|s| s.key), Some(Key::Submit));
        assert!(!layout.slots()[ERASE_INDEX].hidden);
        assert!(!layout.slots()[SUBMIT_INDEX].hidden);
    }

    #[test]
    fn no_mode_is_base_order() {
        let engine = KeypadLayoutEngine::new();
        let mut rng = ScriptedRandom::new();
        let layout = engine.layout(None, &mut rng);
        assert_eq!(layout.digit_order(), BASE_ORDER);
        assert!(!layout.any_hidden());
        assert_actions_fixed(&layout);
    }

    #[test]
    fn hide_keeps_positions_and_suppresses_digit_labels_only() {
        let engine = KeypadLayoutEngine::new();
        let mut rng = ScriptedRandom::new();
        let layout = engine.layout(Some(Mode::Hide), &mut rng);
        assert_eq!(layout.digit_order(), BASE_ORDER);
        for &slot in &DIGIT_SLOTS {
            let s = layout.slots()[slot];
            assert!(s.hidden);
            assert_eq!(s.visual_label(), None);
            assert!(s.accessibility_label().starts_with("Digit "));
        }
        assert_actions_fixed(&layout);
        assert_eq!(layout.slots()[SUBMIT_INDEX].visual_label().as_deref(), Some("•"));
    }

    #[test]
    fn shuffle_permutes_digits_with_fresh_seed_each_time() {
        let engine = KeypadLayoutEngine::new();
        let mut rng = ScriptedRandom::new().seeds(&[11, 12, 13, 14]);
        let layouts: Vec<_> = (0..4).map(|_| engine.layout(Some(Mode::Shuffle), &mut rng)).collect();
        for layout in &layouts {
            let mut digits = layout.digit_order();
            digits.sort_unstable();
            assert_eq!(digits, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
            assert!(!layout.any_hidden());
            assert_actions_fixed(layout);
        }
        assert_eq!(layouts[0], engine.shuffled(11));
        let distinct = layouts
            .iter()
            .map(|l| l.digit_order())
            .collect::<std::collections::HashSet<_>>();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn answer_buffer_edits() {
        let mut buf = AnswerBuffer::new();
        assert_eq!(buf.press(Key::Digit(4)), None);
        assert_eq!(buf.press(Key::Digit(2)), None);
        assert_eq!(buf.press(Key::Digit(7)), None);
        assert_eq!(buf.press(Key::Erase), None);
        assert_eq!(buf.as_str(), "42");
        assert_eq!(buf.press(Key::Submit).as_deref(), Some("42"));
        assert!(buf.is_empty());
        assert_eq!(buf.press(Key::Erase), None);
        assert_eq!(buf.press(Key::Submit).as_deref(), Some(""));
    }
}
