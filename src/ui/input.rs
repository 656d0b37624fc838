/// Keyboard → keypad slot mapping.
///
/// The pad is played positionally, not by digit: a 3×4 block of keys maps
/// onto the 12 slots, so a shuffled or hidden layout really has to be read.
///
///   q w e          slot 0  1  2
///   a s d               3  4  5
///   z x c               6  7  8
///   Backspace v Enter   9 10 11
///
/// Esc backs out (cancels the reveal, leaves the drill). Ctrl+C quits.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, poll};

use pixelcalc::domain::keypad::{ERASE_INDEX, SLOT_COUNT, SUBMIT_INDEX};

const SLOT_KEYS: [char; 9] = ['q', 'w', 'e', 'a', 's', 'd', 'z', 'x', 'c'];
const BOTTOM_MIDDLE: char = 'v';

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PadAction {
    Slot(usize),
    Back,
    Quit,
}

/// Map one key event; `None` for keys the pad doesn't use.
pub fn action_for(key: &KeyEvent) -> Option<PadAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(PadAction::Quit),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char(c) => {
            let c = c.to_ascii_lowercase();
            if c == BOTTOM_MIDDLE {
                return Some(PadAction::Slot(SLOT_COUNT - 2));
            }
            SLOT_KEYS.iter().position(|&k| k == c).map(PadAction::Slot)
        }
        KeyCode::Backspace => Some(PadAction::Slot(ERASE_INDEX)),
        KeyCode::Enter => Some(PadAction::Slot(SUBMIT_INDEX)),
        KeyCode::Esc => Some(PadAction::Back),
        _ => None,
    }
}

pub struct InputState {
    actions: Vec<PadAction>,
}

impl InputState {
    pub fn new() -> Self {
        InputState { actions: Vec::with_capacity(8) }
    }

    /// Drain pending terminal events, waiting at most `wait` for the first.
    pub fn drain_events(&mut self, wait: Duration) -> std::io::Result<&[PadAction]> {
        self.actions.clear();
        let mut timeout = wait;
        while poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if let Some(action) = action_for(&key) {
                    self.actions.push(action);
                }
            }
            timeout = Duration::ZERO;
        }
        Ok(&self.actions)
    }
}
