//! Backend-neutral input events.
//!
//! The grid never sees terminal events directly. Hosts convert whatever their backend produces
//! (see `crossterm_input` behind the `crossterm` feature) into these types.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl KeyModifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::default()
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::default()
        }
    }

    pub fn is_empty(self) -> bool {
        !(self.shift || self.ctrl || self.alt)
    }

    /// Ctrl-click adds to a multi-column sort or toggles a row in multiple selection.
    pub fn extends(self) -> bool {
        self.ctrl
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyCode {
    Char(char),
    /// Function key, one-based.
    F(u8),
    Enter,
    Backspace,
    Delete,
    Insert,
    Tab,
    Esc,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyEvent {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::none(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: KeyModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// The character this key types into a cell editor. Shift is allowed (it is how upper case
    /// arrives); ctrl and alt chords are commands, not text.
    pub fn typed_char(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c) if !self.modifiers.ctrl && !self.modifiers.alt && !c.is_control() => {
                Some(c)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Bracketed paste. Replaces the focused cell's value in an open edit session.
    Paste(String),
    Mouse(MouseEvent),
}

impl InputEvent {
    pub fn key(&self) -> Option<&KeyEvent> {
        match self {
            Self::Key(k) => Some(k),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseEventKind {
    Down(MouseButton),
    Drag(MouseButton),
    Up(MouseButton),
    /// Terminals rarely report this; views synthesize it from two quick `Down`s.
    DoubleClick(MouseButton),
    ScrollUp,
    ScrollDown,
}

/// A pointer event in terminal cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouseEvent {
    pub x: u16,
    pub y: u16,
    pub kind: MouseEventKind,
    pub modifiers: KeyModifiers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_char_ignores_command_chords() {
        assert_eq!(KeyEvent::new(KeyCode::Char('a')).typed_char(), Some('a'));
        let upper = KeyEvent::new(KeyCode::Char('A')).with_modifiers(KeyModifiers::shift());
        assert_eq!(upper.typed_char(), Some('A'));
        let chord = KeyEvent::new(KeyCode::Char('a')).with_modifiers(KeyModifiers::ctrl());
        assert_eq!(chord.typed_char(), None);
        assert_eq!(KeyEvent::new(KeyCode::Enter).typed_char(), None);
    }

    #[test]
    fn modifiers_report_emptiness() {
        assert!(KeyModifiers::none().is_empty());
        assert!(!KeyModifiers::shift().is_empty());
        assert!(KeyModifiers::ctrl().extends());
    }
}
