#[cfg(target_arch = "wasm32")]
pub mod wasm;

use serde::{Deserialize, Serialize};

use crate::config::KeyConfig;
use crate::error::ViewerError;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_alphabetic() {
                return Some(Self::Character(ch.to_ascii_uppercase()));
            }
            if ch.is_ascii_digit() {
                return Some(Self::Digit(ch as u8 - b'0'));
            }
        }
        if let Some(function) = name.strip_prefix('F').or_else(|| name.strip_prefix('f')) {
            if let Ok(index) = function.parse::<u8>() {
                if (1..=25).contains(&index) {
                    return Some(Self::Function(index));
                }
            }
        }
        None
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" | " " => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Left" | "ArrowLeft" => Left,
        "Right" | "ArrowRight" => Right,
        "Up" | "ArrowUp" => Up,
        "Down" | "ArrowDown" => Down,
        "Escape" | "Esc" => Escape,
        "LeftShift" | "LShift" => LeftShift,
        "RightShift" | "RShift" => RightShift,
        "LeftCtrl" | "LControl" => LeftCtrl,
        "RightCtrl" | "RControl" => RightCtrl,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Friendly names for the non-printable keys the viewer can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
}

/// Something the user asked the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveForward,
    MoveBack,
    StrafeLeft,
    StrafeRight,
    StopCar,
    FilledMode,
    WireframeMode,
    ReleasePointer,
}

/// Platform-neutral input delivered by the native window or the DOM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    /// Raw pointer motion. Ignored unless pointer capture is engaged.
    PointerMotion { dx: f32, dy: f32 },
    PointerCapture(bool),
}

/// Resolved key to action table.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBindings {
    entries: Vec<(KeyCode, Action)>,
}

impl KeyBindings {
    pub fn from_config(keys: &KeyConfig) -> Result<Self, ViewerError> {
        let table = [
            (&keys.forward, Action::MoveForward),
            (&keys.back, Action::MoveBack),
            (&keys.left, Action::StrafeLeft),
            (&keys.right, Action::StrafeRight),
            (&keys.stop, Action::StopCar),
            (&keys.filled, Action::FilledMode),
            (&keys.wireframe, Action::WireframeMode),
            (&keys.release_pointer, Action::ReleasePointer),
        ];
        let mut entries = Vec::with_capacity(table.len());
        for (name, action) in table {
            let key = KeyCode::from_name(name)
                .ok_or_else(|| ViewerError::Config(format!("unknown key name {name:?}")))?;
            if let Some((_, existing)) = entries.iter().find(|(bound, _)| *bound == key) {
                return Err(ViewerError::Config(format!(
                    "key {name:?} is bound to both {existing:?} and {action:?}"
                )));
            }
            entries.push((key, action));
        }
        Ok(Self { entries })
    }

    pub fn action_for(&self, key: KeyCode) -> Option<Action> {
        self.entries
            .iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, action)| *action)
    }

    /// Resolves a key name and keeps it only when an action is bound to it.
    pub fn bound_key(&self, name: &str) -> Option<KeyCode> {
        KeyCode::from_name(name).filter(|key| self.action_for(*key).is_some())
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        use Action::*;
        Self {
            entries: vec![
                (KeyCode::Character('W'), MoveForward),
                (KeyCode::Character('S'), MoveBack),
                (KeyCode::Character('A'), StrafeLeft),
                (KeyCode::Character('D'), StrafeRight),
                (KeyCode::Named(NamedKey::Space), StopCar),
                (KeyCode::Digit(1), FilledMode),
                (KeyCode::Digit(2), WireframeMode),
                (KeyCode::Named(NamedKey::Escape), ReleasePointer),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_character_keys() {
        assert_eq!(
            KeyCode::from_name("Space"),
            Some(KeyCode::Named(NamedKey::Space))
        );
        assert_eq!(KeyCode::from_name("w"), Some(KeyCode::Character('W')));
        assert_eq!(KeyCode::from_name("2"), Some(KeyCode::Digit(2)));
        assert_eq!(KeyCode::from_name("F12"), Some(KeyCode::Function(12)));
        assert_eq!(KeyCode::from_name("F40"), None);
        assert_eq!(KeyCode::from_name("Hyper"), None);
    }

    #[test]
    fn default_config_matches_default_bindings() {
        let bindings = KeyBindings::from_config(&KeyConfig::default()).unwrap();
        assert_eq!(bindings, KeyBindings::default());
        assert_eq!(
            bindings.action_for(KeyCode::Digit(2)),
            Some(Action::WireframeMode)
        );
        assert_eq!(bindings.action_for(KeyCode::Character('Q')), None);
    }

    #[test]
    fn only_bound_keys_are_claimed() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.bound_key("w"), Some(KeyCode::Character('W')));
        assert_eq!(bindings.bound_key(" "), Some(KeyCode::Named(NamedKey::Space)));
        for browser_key in ["F5", "F12", "Tab", "Enter", "r", "9"] {
            assert_eq!(bindings.bound_key(browser_key), None, "{browser_key}");
        }
        assert_eq!(bindings.bound_key("Hyper"), None);
    }

    #[test]
    fn rejects_unknown_and_duplicate_keys() {
        let mut keys = KeyConfig::default();
        keys.stop = "NotAKey".into();
        assert!(matches!(
            KeyBindings::from_config(&keys),
            Err(ViewerError::Config(_))
        ));

        let mut keys = KeyConfig::default();
        keys.back = "W".into();
        assert!(KeyBindings::from_config(&keys).is_err());
    }
}
