//! Android key events that a client is permitted to inject.
//!
//! The set is closed: a key event that is not listed here cannot be sent to a
//! device, even if the device itself would accept it.  Each variant maps 1:1 to
//! an Android `KEYCODE_*` name understood by `input keyevent`.

/// A permitted Android key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    DpadCenter,
    Enter,
    Back,
    Home,
    Menu,
    Power,
    VolumeUp,
    VolumeDown,
    Mute,
    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,
    /// Backspace.
    Del,
    Space,
}

impl KeyCode {
    /// Every permitted key event, in allow-list order.
    pub const ALL: [KeyCode; 25] = [
        KeyCode::DpadUp,
        KeyCode::DpadDown,
        KeyCode::DpadLeft,
        KeyCode::DpadRight,
        KeyCode::DpadCenter,
        KeyCode::Enter,
        KeyCode::Back,
        KeyCode::Home,
        KeyCode::Menu,
        KeyCode::Power,
        KeyCode::VolumeUp,
        KeyCode::VolumeDown,
        KeyCode::Mute,
        KeyCode::Digit0,
        KeyCode::Digit1,
        KeyCode::Digit2,
        KeyCode::Digit3,
        KeyCode::Digit4,
        KeyCode::Digit5,
        KeyCode::Digit6,
        KeyCode::Digit7,
        KeyCode::Digit8,
        KeyCode::Digit9,
        KeyCode::Del,
        KeyCode::Space,
    ];

    /// Returns the Android key code name, e.g. `"KEYCODE_DPAD_UP"`.
    pub fn android_name(self) -> &'static str {
        match self {
            KeyCode::DpadUp => "KEYCODE_DPAD_UP",
            KeyCode::DpadDown => "KEYCODE_DPAD_DOWN",
            KeyCode::DpadLeft => "KEYCODE_DPAD_LEFT",
            KeyCode::DpadRight => "KEYCODE_DPAD_RIGHT",
            KeyCode::DpadCenter => "KEYCODE_DPAD_CENTER",
            KeyCode::Enter => "KEYCODE_ENTER",
            KeyCode::Back => "KEYCODE_BACK",
            KeyCode::Home => "KEYCODE_HOME",
            KeyCode::Menu => "KEYCODE_MENU",
            KeyCode::Power => "KEYCODE_POWER",
            KeyCode::VolumeUp => "KEYCODE_VOLUME_UP",
            KeyCode::VolumeDown => "KEYCODE_VOLUME_DOWN",
            KeyCode::Mute => "KEYCODE_MUTE",
            KeyCode::Digit0 => "KEYCODE_0",
            KeyCode::Digit1 => "KEYCODE_1",
            KeyCode::Digit2 => "KEYCODE_2",
            KeyCode::Digit3 => "KEYCODE_3",
            KeyCode::Digit4 => "KEYCODE_4",
            KeyCode::Digit5 => "KEYCODE_5",
            KeyCode::Digit6 => "KEYCODE_6",
            KeyCode::Digit7 => "KEYCODE_7",
            KeyCode::Digit8 => "KEYCODE_8",
            KeyCode::Digit9 => "KEYCODE_9",
            KeyCode::Del => "KEYCODE_DEL",
            KeyCode::Space => "KEYCODE_SPACE",
        }
    }

    /// Looks up a key event by its exact Android name.
    ///
    /// Matching is case-sensitive; `"keycode_home"` is not recognised.
    pub fn from_android_name(name: &str) -> Option<KeyCode> {
        KeyCode::ALL
            .iter()
            .copied()
            .find(|code| code.android_name() == name)
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.android_name())
    }
}
