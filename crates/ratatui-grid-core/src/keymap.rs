use crate::input::KeyCode;
use crate::input::KeyEvent;
use crate::input::KeyModifiers;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub keys: Vec<KeyEvent>,
    pub help_key: String,
    pub help_desc: String,
}

impl Binding {
    pub fn new(
        help_key: impl Into<String>,
        help_desc: impl Into<String>,
        keys: Vec<KeyEvent>,
    ) -> Self {
        Self {
            keys,
            help_key: help_key.into(),
            help_desc: help_desc.into(),
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.keys.iter().any(|k| key_event_matches(k, event))
    }
}

pub fn key_event_matches(pattern: &KeyEvent, event: &KeyEvent) -> bool {
    pattern.code == event.code && modifiers_match(pattern.modifiers, event.modifiers)
}

fn modifiers_match(pattern: KeyModifiers, event: KeyModifiers) -> bool {
    pattern.shift == event.shift && pattern.ctrl == event.ctrl && pattern.alt == event.alt
}

pub fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code)
}

pub fn key_char(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c))
}

pub fn key_ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c)).with_modifiers(KeyModifiers::ctrl())
}

pub fn key_shift(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code).with_modifiers(KeyModifiers::shift())
}

pub fn key_ctrl_code(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code).with_modifiers(KeyModifiers::ctrl())
}

pub fn key_alt(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code).with_modifiers(KeyModifiers {
        shift: false,
        ctrl: false,
        alt: true,
    })
}

/// Key bindings recognised by [`crate::grid::Grid::handle_event`].
///
/// Handlers run in a fixed order: sort, filter, edit, then navigation/selection. The first
/// handler that recognises a key consumes it.
#[derive(Clone, Debug)]
pub struct GridBindings {
    pub sort: Binding,
    pub multi_sort: Binding,
    pub filter_menu: Binding,
    pub clear_filter: Binding,
    pub begin_edit: Binding,
    pub begin_add: Binding,
    pub begin_delete: Binding,
    pub save: Binding,
    pub cancel: Binding,
    pub select: Binding,
    pub select_all: Binding,
    pub copy: Binding,
    pub prev_page: Binding,
    pub next_page: Binding,
}

impl Default for GridBindings {
    fn default() -> Self {
        Self {
            sort: Binding::new("enter", "sort", vec![key(KeyCode::Enter)]),
            multi_sort: Binding::new(
                "ctrl+enter",
                "add sort",
                vec![key_ctrl_code(KeyCode::Enter)],
            ),
            filter_menu: Binding::new("alt+↓", "filter", vec![key_alt(KeyCode::Down)]),
            clear_filter: Binding::new(
                "ctrl+shift+l",
                "clear filter",
                vec![KeyEvent::new(KeyCode::Char('L')).with_modifiers(KeyModifiers {
                    shift: true,
                    ctrl: true,
                    alt: false,
                })],
            ),
            begin_edit: Binding::new("F2", "edit", vec![key(KeyCode::F(2))]),
            begin_add: Binding::new("ins", "add", vec![key(KeyCode::Insert)]),
            begin_delete: Binding::new("del", "delete", vec![key(KeyCode::Delete)]),
            save: Binding::new("enter", "save", vec![key(KeyCode::Enter)]),
            cancel: Binding::new("esc", "cancel", vec![key(KeyCode::Esc)]),
            select: Binding::new("space", "select", vec![key_char(' ')]),
            select_all: Binding::new("ctrl+a", "select all", vec![key_ctrl('a')]),
            copy: Binding::new("y", "copy", vec![key_char('y')]),
            prev_page: Binding::new("pgup", "prev page", vec![key(KeyCode::PageUp)]),
            next_page: Binding::new("pgdn", "next page", vec![key(KeyCode::PageDown)]),
        }
    }
}

impl GridBindings {
    /// Bindings worth showing in a help bar.
    pub fn help(&self) -> Vec<Binding> {
        vec![
            self.sort.clone(),
            self.filter_menu.clone(),
            self.begin_edit.clone(),
            self.begin_add.clone(),
            self.begin_delete.clone(),
            self.select.clone(),
            self.next_page.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_matches_exact_modifiers() {
        let b = Binding::new("q", "quit", vec![key_char('q')]);
        assert!(b.matches(&key_char('q')));
        assert!(!b.matches(&key_ctrl('q')));
    }

    #[test]
    fn sort_and_multi_sort_do_not_overlap() {
        let b = GridBindings::default();
        assert!(b.sort.matches(&key(KeyCode::Enter)));
        assert!(!b.sort.matches(&key_ctrl_code(KeyCode::Enter)));
        assert!(b.multi_sort.matches(&key_ctrl_code(KeyCode::Enter)));
    }
}
