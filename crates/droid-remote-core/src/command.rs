//! The command authorization boundary.
//!
//! Two layers guard every instruction that reaches a device shell:
//!
//! 1. [`is_allowed`] – a literal, case-sensitive prefix test against
//!    [`ALLOWED_PREFIXES`].  An instruction that fails it is rejected as
//!    [`CommandError::Unauthorized`].
//! 2. [`DeviceCommand`] – the closed set of command shapes.  An instruction that
//!    passes the prefix test must also parse into one of these shapes; the
//!    device then receives the command's canonical rendering, never the raw
//!    client string.  This is what stops `input keyevent KEYCODE_1; reboot`
//!    from slipping through on the strength of its prefix.
//!
//! Commands built directly by the server (text, tap, swipe, screen capture)
//! go through the same [`DeviceCommand::authorize`] check before dispatch, so
//! there is no path to the bridge that skips the allow-list.
//!
//! ```rust
//! use droid_remote_core::command::{is_allowed, DeviceCommand};
//!
//! assert!(is_allowed("input keyevent KEYCODE_HOME"));
//! assert!(!is_allowed("rm -rf /"));
//!
//! let cmd = DeviceCommand::swipe(100, 100, 150, 80, None);
//! assert_eq!(cmd.render(), "input touchscreen swipe 100 100 150 80 300");
//! ```

use std::fmt;

use thiserror::Error;

use crate::keycode::KeyCode;

/// Swipe duration used when the client does not specify one.
pub const DEFAULT_SWIPE_DURATION_MS: u32 = 300;

/// Instruction prefixes a client may send.
pub const ALLOWED_PREFIXES: [&str; 29] = [
    "input keyevent KEYCODE_DPAD_UP",
    "input keyevent KEYCODE_DPAD_DOWN",
    "input keyevent KEYCODE_DPAD_LEFT",
    "input keyevent KEYCODE_DPAD_RIGHT",
    "input keyevent KEYCODE_DPAD_CENTER",
    "input keyevent KEYCODE_ENTER",
    "input keyevent KEYCODE_BACK",
    "input keyevent KEYCODE_HOME",
    "input keyevent KEYCODE_MENU",
    "input keyevent KEYCODE_POWER",
    "input keyevent KEYCODE_VOLUME_UP",
    "input keyevent KEYCODE_VOLUME_DOWN",
    "input keyevent KEYCODE_MUTE",
    "input keyevent KEYCODE_0",
    "input keyevent KEYCODE_1",
    "input keyevent KEYCODE_2",
    "input keyevent KEYCODE_3",
    "input keyevent KEYCODE_4",
    "input keyevent KEYCODE_5",
    "input keyevent KEYCODE_6",
    "input keyevent KEYCODE_7",
    "input keyevent KEYCODE_8",
    "input keyevent KEYCODE_9",
    "input keyevent KEYCODE_DEL",
    "input keyevent KEYCODE_SPACE",
    "input text",
    "input mouse",
    "input touchscreen",
    "screencap",
];

/// Returns `true` iff `instruction` starts with one of [`ALLOWED_PREFIXES`].
///
/// The test is a literal, case-sensitive prefix match with no pattern syntax.
pub fn is_allowed(instruction: &str) -> bool {
    ALLOWED_PREFIXES
        .iter()
        .any(|prefix| instruction.starts_with(prefix))
}

/// Reasons a request is refused before it reaches the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The instruction does not start with any allow-listed prefix.
    #[error("Unauthorized command")]
    Unauthorized(String),

    /// The instruction has an allowed prefix but is not a recognised command shape.
    #[error("Invalid command: {reason}")]
    InvalidCommand { instruction: String, reason: String },

    /// A required identifier was absent or empty.
    #[error("No {0} provided")]
    MissingParameter(&'static str),
}

impl CommandError {
    fn invalid(instruction: &str, reason: impl Into<String>) -> Self {
        CommandError::InvalidCommand {
            instruction: instruction.to_string(),
            reason: reason.into(),
        }
    }
}

/// Which `input` source a pointer gesture is injected through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    Touchscreen,
    Mouse,
}

impl PointerSource {
    fn as_str(self) -> &'static str {
        match self {
            PointerSource::Touchscreen => "touchscreen",
            PointerSource::Mouse => "mouse",
        }
    }
}

impl fmt::Display for PointerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device shell command in one of the permitted shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// `input keyevent KEYCODE_*`
    KeyEvent(KeyCode),
    /// `input text "<escaped>"`; the string is stored unescaped.
    TextInput(String),
    /// `input <source> tap x y`
    Tap { source: PointerSource, x: i32, y: i32 },
    /// `input <source> swipe x1 y1 x2 y2 duration`
    Swipe {
        source: PointerSource,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u32,
    },
    /// `screencap -p`
    Screencap,
}

impl DeviceCommand {
    /// Builds the command for a client text entry.
    ///
    /// A lone space is sent as the space key event: free-text injection of a
    /// bare space is dropped by the device's `input text` implementation.
    pub fn text(text: &str) -> Self {
        if text == " " {
            DeviceCommand::KeyEvent(KeyCode::Space)
        } else {
            DeviceCommand::TextInput(text.to_string())
        }
    }

    /// A touchscreen tap at `(x, y)`.  Coordinates are not range-checked.
    pub fn tap(x: i32, y: i32) -> Self {
        DeviceCommand::Tap {
            source: PointerSource::Touchscreen,
            x,
            y,
        }
    }

    /// A touchscreen swipe.  A missing or zero `duration_ms` falls back to
    /// [`DEFAULT_SWIPE_DURATION_MS`].
    pub fn swipe(x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: Option<u32>) -> Self {
        DeviceCommand::Swipe {
            source: PointerSource::Touchscreen,
            x1,
            y1,
            x2,
            y2,
            duration_ms: duration_ms
                .filter(|d| *d > 0)
                .unwrap_or(DEFAULT_SWIPE_DURATION_MS),
        }
    }

    /// Parses a raw client instruction.
    ///
    /// # Errors
    ///
    /// - [`CommandError::Unauthorized`] if [`is_allowed`] rejects the string.
    /// - [`CommandError::InvalidCommand`] if the prefix is allowed but the rest
    ///   does not form a recognised command.
    pub fn parse(instruction: &str) -> Result<Self, CommandError> {
        if !is_allowed(instruction) {
            return Err(CommandError::Unauthorized(instruction.to_string()));
        }

        // Free text keeps its internal whitespace, so it is split off before
        // tokenising the rest of the grammar.
        if let Some(rest) = instruction.strip_prefix("input text") {
            let text = rest
                .strip_prefix(' ')
                .ok_or_else(|| CommandError::invalid(instruction, "missing text argument"))?;
            return Ok(DeviceCommand::TextInput(unquote(text)));
        }

        let tokens: Vec<&str> = instruction.split_whitespace().collect();
        match tokens.as_slice() {
            ["input", "keyevent", name] => KeyCode::from_android_name(name)
                .map(DeviceCommand::KeyEvent)
                .ok_or_else(|| CommandError::invalid(instruction, format!("key {name} not permitted"))),
            ["input", "touchscreen", rest @ ..] => {
                parse_pointer(instruction, PointerSource::Touchscreen, rest)
            }
            ["input", "mouse", rest @ ..] => parse_pointer(instruction, PointerSource::Mouse, rest),
            ["screencap"] | ["screencap", "-p"] => Ok(DeviceCommand::Screencap),
            _ => Err(CommandError::invalid(instruction, "unrecognised command shape")),
        }
    }

    /// Renders the canonical shell instruction for this command.
    pub fn render(&self) -> String {
        match self {
            DeviceCommand::KeyEvent(code) => format!("input keyevent {code}"),
            DeviceCommand::TextInput(text) => format!("input text \"{}\"", escape_text(text)),
            DeviceCommand::Tap { source, x, y } => format!("input {source} tap {x} {y}"),
            DeviceCommand::Swipe {
                source,
                x1,
                y1,
                x2,
                y2,
                duration_ms,
            } => format!("input {source} swipe {x1} {y1} {x2} {y2} {duration_ms}"),
            DeviceCommand::Screencap => "screencap -p".to_string(),
        }
    }

    /// Renders the command and re-checks it against the allow-list.
    ///
    /// Every dispatch goes through here, including commands the server builds
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Unauthorized`] if the rendering is not allowed.
    pub fn authorize(&self) -> Result<String, CommandError> {
        let instruction = self.render();
        if is_allowed(&instruction) {
            Ok(instruction)
        } else {
            Err(CommandError::Unauthorized(instruction))
        }
    }

    /// Short variant name for log lines; never includes user text.
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceCommand::KeyEvent(_) => "KeyEvent",
            DeviceCommand::TextInput(_) => "TextInput",
            DeviceCommand::Tap { .. } => "Tap",
            DeviceCommand::Swipe { .. } => "Swipe",
            DeviceCommand::Screencap => "Screencap",
        }
    }
}

/// Escapes `text` for use inside a double-quoted device shell word.
///
/// Each `\`, `"`, `$` and `` ` `` is prefixed with a backslash; these are the
/// only characters the shell still interprets between double quotes.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Strips one layer of double quotes and backslash escapes, if present.
fn unquote(text: &str) -> String {
    let Some(inner) = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
    else {
        return text.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

fn parse_pointer(
    instruction: &str,
    source: PointerSource,
    args: &[&str],
) -> Result<DeviceCommand, CommandError> {
    match args {
        ["tap", x, y] => Ok(DeviceCommand::Tap {
            source,
            x: parse_coord(instruction, x)?,
            y: parse_coord(instruction, y)?,
        }),
        ["swipe", x1, y1, x2, y2, rest @ ..] => {
            let duration_ms = match rest {
                [] => DEFAULT_SWIPE_DURATION_MS,
                [d] => d.parse::<u32>().map_err(|_| {
                    CommandError::invalid(instruction, format!("'{d}' is not a duration"))
                })?,
                _ => return Err(CommandError::invalid(instruction, "too many swipe arguments")),
            };
            Ok(DeviceCommand::Swipe {
                source,
                x1: parse_coord(instruction, x1)?,
                y1: parse_coord(instruction, y1)?,
                x2: parse_coord(instruction, x2)?,
                y2: parse_coord(instruction, y2)?,
                duration_ms,
            })
        }
        _ => Err(CommandError::invalid(instruction, "unrecognised pointer gesture")),
    }
}

fn parse_coord(instruction: &str, s: &str) -> Result<i32, CommandError> {
    s.parse::<i32>()
        .map_err(|_| CommandError::invalid(instruction, format!("'{s}' is not a coordinate")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
