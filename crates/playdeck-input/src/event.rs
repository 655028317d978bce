use embedded_graphics::prelude::Point;
use serde::{Deserialize, Serialize};

/// Logical key codes shared by every input source.
///
/// Hardware pins, IR remote codes, keyboard scancodes, voice verbs and REST
/// commands all normalize to these before entering the widget tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Select,
    Back,
    Menu,
    PlayPause,
    VolumeUp,
    VolumeDown,
}

impl Key {
    pub fn label(self) -> &'static str {
        match self {
            Key::Up => "UP",
            Key::Down => "DOWN",
            Key::Left => "LEFT",
            Key::Right => "RIGHT",
            Key::Select => "SELECT",
            Key::Back => "BACK",
            Key::Menu => "MENU",
            Key::PlayPause => "PLAY/PAUSE",
            Key::VolumeUp => "VOL+",
            Key::VolumeDown => "VOL-",
        }
    }

    /// The focus-movement direction this key encodes, if any.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Key::Up => Some(Direction::Up),
            Key::Down => Some(Direction::Down),
            Key::Left => Some(Direction::Left),
            Key::Right => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Which kind of producer a keyboard-like event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// GPIO pad, rotary encoder, IR remote or attached keyboard.
    Keypad,
    /// Voice assistant mapped a recognized verb onto a key.
    Voice,
    /// REST handler mapped a request onto a key.
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    /// Key released. `long_press` is set only by sources that already
    /// resolved press duration themselves (REST, voice); hardware adapters
    /// always send `false` and leave duration policy to the control.
    Up { long_press: bool },
}

impl KeyAction {
    pub const fn release() -> Self {
        KeyAction::Up { long_press: false }
    }
}

/// Focus-movement direction carried by arrow/remote keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Canonical input event.
///
/// Produced by adapter threads and external surfaces, consumed exactly once
/// on the main loop. Arrival order is delivery order; there is no ordering
/// guarantee across distinct producers.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key {
        source: KeySource,
        key: Key,
        action: KeyAction,
    },
    /// Raw recognized utterance for screens that consume verbs directly.
    Voice { command: String },
    /// REST verb pass-through for screens that consume commands directly.
    Rest { command: String },
    /// Request that whichever control contains `point` become selected.
    SelectAt { point: Point },
}

impl InputEvent {
    /// Shorthand for a keypad-sourced key transition.
    pub fn keypad(key: Key, action: KeyAction) -> Self {
        InputEvent::Key {
            source: KeySource::Keypad,
            key,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_keys_map_to_directions() {
        assert_eq!(Key::Up.direction(), Some(Direction::Up));
        assert_eq!(Key::Down.direction(), Some(Direction::Down));
        assert_eq!(Key::Left.direction(), Some(Direction::Left));
        assert_eq!(Key::Right.direction(), Some(Direction::Right));
        assert_eq!(Key::Select.direction(), None);
        assert_eq!(Key::VolumeUp.direction(), None);
    }

    #[test]
    fn key_serde_round_trip() {
        let json = serde_json::to_string(&Key::VolumeDown).expect("serialize key");
        let decoded: Key = serde_json::from_str(&json).expect("deserialize key");
        assert_eq!(decoded, Key::VolumeDown);
    }

    #[test]
    fn keypad_shorthand_tags_source() {
        let event = InputEvent::keypad(Key::Select, KeyAction::Down);
        match event {
            InputEvent::Key { source, key, action } => {
                assert_eq!(source, KeySource::Keypad);
                assert_eq!(key, Key::Select);
                assert_eq!(action, KeyAction::Down);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
