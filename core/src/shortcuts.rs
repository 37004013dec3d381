//! Global keyboard shortcuts for the dashboard.
//!
//! A chord matches a key press when the key matches case-insensitively and
//! every modifier agrees: a chord requiring Ctrl accepts Ctrl or Meta, a chord
//! without Ctrl rejects both, and Shift/Alt must match exactly.

use serde::{Deserialize, Serialize};

/// Dashboard action bound to a chord
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutAction {
    /// Pause or resume the incident stream
    ToggleStream,
    /// Download the CSV export
    Export,
    /// Restore the default filter and sort
    ResetFilters,
}

impl ShortcutAction {
    pub fn description(&self) -> &'static str {
        match self {
            ShortcutAction::ToggleStream => "Pause/Resume stream",
            ShortcutAction::Export => "Export incidents",
            ShortcutAction::ResetFilters => "Reset filters",
        }
    }
}

/// Key press as reported by the client
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPress {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
}

impl KeyPress {
    pub fn ctrl(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: true,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyChord {
    pub fn ctrl(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: true,
            shift: false,
            alt: false,
        }
    }

    pub fn matches(&self, press: &KeyPress) -> bool {
        let ctrl_ok = if self.ctrl {
            press.ctrl || press.meta
        } else {
            !press.ctrl && !press.meta
        };
        press.key.eq_ignore_ascii_case(&self.key)
            && ctrl_ok
            && press.shift == self.shift
            && press.alt == self.alt
    }

    /// "Ctrl+P"
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl".to_string());
        }
        if self.shift {
            parts.push("Shift".to_string());
        }
        if self.alt {
            parts.push("Alt".to_string());
        }
        parts.push(self.key.to_uppercase());
        parts.join("+")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    pub chord: KeyChord,
    pub action: ShortcutAction,
}

/// Ordered set of bindings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutMap {
    bindings: Vec<Shortcut>,
}

impl ShortcutMap {
    pub fn new(bindings: Vec<Shortcut>) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &[Shortcut] {
        &self.bindings
    }

    /// Every action whose chord matches, in binding order
    pub fn resolve(&self, press: &KeyPress) -> Vec<ShortcutAction> {
        self.bindings
            .iter()
            .filter(|b| b.chord.matches(press))
            .map(|b| b.action)
            .collect()
    }
}

impl Default for ShortcutMap {
    fn default() -> Self {
        Self::new(vec![
            Shortcut {
                chord: KeyChord::ctrl("p"),
                action: ShortcutAction::ToggleStream,
            },
            Shortcut {
                chord: KeyChord::ctrl("e"),
                action: ShortcutAction::Export,
            },
            Shortcut {
                chord: KeyChord::ctrl("r"),
                action: ShortcutAction::ResetFilters,
            },
        ])
    }
}
