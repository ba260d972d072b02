use crate::value::RowKey;
use indexmap::IndexSet;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMode {
    None,
    #[default]
    Single,
    Multiple,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectionSettings {
    pub mode: SelectionMode,
    /// In single mode, activating the selected row again deselects it.
    pub toggle: bool,
}

impl SelectionSettings {
    pub fn with_mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }
}

/// What the host is asked to approve before the selection changes.
#[derive(Clone, Debug)]
pub struct SelectingArgs<'a> {
    pub previous: &'a IndexSet<RowKey>,
    pub proposed: &'a IndexSet<RowKey>,
    /// The row whose activation triggered the change; `None` for bulk changes.
    pub trigger: Option<&'a RowKey>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionDecision {
    Apply,
    Cancel,
    Replace(IndexSet<RowKey>),
}

/// Host-controlled selection.
pub trait SelectionHandler {
    fn selecting(&mut self, args: &SelectingArgs<'_>) -> SelectionDecision;
}

/// Selected row keys in selection order.
///
/// Single mode never holds more than one key; mode `None` holds none.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    settings: SelectionSettings,
    keys: IndexSet<RowKey>,
}

impl SelectionState {
    pub fn new(settings: SelectionSettings) -> Self {
        Self {
            settings,
            keys: IndexSet::new(),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.settings.mode
    }

    pub fn keys(&self) -> &IndexSet<RowKey> {
        &self.keys
    }

    pub fn is_selected(&self, key: &RowKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Changes the settings, trimming the selection to what the new mode allows.
    pub fn set_settings(&mut self, settings: SelectionSettings) -> bool {
        self.settings = settings;
        let before = self.keys.len();
        match settings.mode {
            SelectionMode::None => self.keys.clear(),
            SelectionMode::Single => self.keys.truncate(1),
            SelectionMode::Multiple => {}
        }
        before != self.keys.len()
    }

    /// Reacts to a confirmed click or keyboard activation of `key`.
    pub fn on_activate(
        &mut self,
        key: &RowKey,
        handler: Option<&mut dyn SelectionHandler>,
    ) -> bool {
        let proposed = match self.settings.mode {
            SelectionMode::None => return false,
            SelectionMode::Single => {
                if self.settings.toggle && self.keys.contains(key) {
                    IndexSet::new()
                } else {
                    IndexSet::from([key.clone()])
                }
            }
            SelectionMode::Multiple => {
                let mut next = self.keys.clone();
                if !next.shift_remove(key) {
                    next.insert(key.clone());
                }
                next
            }
        };
        self.commit(proposed, Some(key), handler)
    }

    /// Selects every key in `all`. Only multiple mode supports this.
    pub fn select_all<'k>(
        &mut self,
        all: impl IntoIterator<Item = &'k RowKey>,
        handler: Option<&mut dyn SelectionHandler>,
    ) -> bool {
        if self.settings.mode != SelectionMode::Multiple {
            return false;
        }
        let proposed: IndexSet<RowKey> = all.into_iter().cloned().collect();
        self.commit(proposed, None, handler)
    }

    pub fn clear(&mut self, handler: Option<&mut dyn SelectionHandler>) -> bool {
        self.commit(IndexSet::new(), None, handler)
    }

    /// Drops keys that are no longer backed by a record. Not interceptable.
    pub fn retain(&mut self, mut present: impl FnMut(&RowKey) -> bool) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| present(k));
        before != self.keys.len()
    }

    fn commit(
        &mut self,
        proposed: IndexSet<RowKey>,
        trigger: Option<&RowKey>,
        handler: Option<&mut dyn SelectionHandler>,
    ) -> bool {
        if proposed == self.keys {
            return false;
        }
        let mut next = match handler {
            None => proposed,
            Some(handler) => {
                let decision = handler.selecting(&SelectingArgs {
                    previous: &self.keys,
                    proposed: &proposed,
                    trigger,
                });
                match decision {
                    SelectionDecision::Apply => proposed,
                    SelectionDecision::Cancel => return false,
                    SelectionDecision::Replace(keys) => keys,
                }
            }
        };
        match self.settings.mode {
            SelectionMode::None => next.clear(),
            SelectionMode::Single => next.truncate(1),
            SelectionMode::Multiple => {}
        }
        if next == self.keys {
            return false;
        }
        self.keys = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(mode: SelectionMode) -> SelectionState {
        SelectionState::new(SelectionSettings {
            mode,
            toggle: false,
        })
    }

    #[test]
    fn single_mode_replaces() {
        let mut s = state(SelectionMode::Single);
        assert!(s.on_activate(&RowKey::Int(1), None));
        assert!(s.on_activate(&RowKey::Int(2), None));
        assert_eq!(s.keys().iter().collect::<Vec<_>>(), vec![&RowKey::Int(2)]);
        assert!(!s.on_activate(&RowKey::Int(2), None));
    }

    #[test]
    fn multiple_mode_toggles_membership() {
        let mut s = state(SelectionMode::Multiple);
        s.on_activate(&RowKey::Int(1), None);
        s.on_activate(&RowKey::Int(2), None);
        s.on_activate(&RowKey::Int(1), None);
        assert_eq!(s.keys().iter().collect::<Vec<_>>(), vec![&RowKey::Int(2)]);
    }

    #[test]
    fn none_mode_ignores_activation_and_clears() {
        let mut s = state(SelectionMode::Multiple);
        s.on_activate(&RowKey::Int(1), None);
        assert!(s.set_settings(SelectionSettings::default().with_mode(SelectionMode::None)));
        assert!(s.is_empty());
        assert!(!s.on_activate(&RowKey::Int(3), None));
    }

    struct Veto;

    impl SelectionHandler for Veto {
        fn selecting(&mut self, args: &SelectingArgs<'_>) -> SelectionDecision {
            if args.trigger == Some(&RowKey::Int(13)) {
                SelectionDecision::Cancel
            } else {
                SelectionDecision::Replace(
                    args.proposed
                        .iter()
                        .chain(std::iter::once(&RowKey::Int(99)))
                        .cloned()
                        .collect(),
                )
            }
        }
    }

    #[test]
    fn host_handler_decides() {
        let mut s = state(SelectionMode::Single);
        assert!(!s.on_activate(&RowKey::Int(13), Some(&mut Veto)));
        assert!(s.is_empty());

        // Replacement is still held to the single-mode limit.
        assert!(s.on_activate(&RowKey::Int(1), Some(&mut Veto)));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn retain_drops_deleted_rows() {
        let mut s = state(SelectionMode::Multiple);
        let keys = [RowKey::Int(1), RowKey::Int(2), RowKey::Int(3)];
        s.select_all(keys.iter(), None);
        assert!(s.retain(|k| *k != RowKey::Int(2)));
        assert_eq!(s.len(), 2);
    }
}
