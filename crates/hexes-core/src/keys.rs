#![forbid(unsafe_code)]

//! Escape-sequence classification and the terminfo key table.
//!
//! The byte reader hands this module the body of an escape sequence (the
//! bytes that followed ESC). Classification is pure so it can be tested
//! without a terminal:
//!
//! 1. empty body → the Escape key itself
//! 2. exact match in the key table → the mapped key
//! 3. `[O` / `[I` → focus out / focus in (when focus reporting is on)
//! 4. a recognizable mouse report shape → [`KeyCode::Mouse`]
//! 5. one byte → Alt+byte (control-folded)
//! 6. anything else → [`KeyCode::Unknown`]
//!
//! The key table is built once from the capability store: each known key
//! capability whose value starts with ESC contributes its remainder as a
//! match suffix. The table is sorted and binary-searched.

use crate::event::{KeyCode, Modifiers};
use crate::terminfo::{Database, cap};

/// The decoder's escape stash is bounded; longer sequences are reported as
/// [`KeyCode::Unknown`] with the bytes retained for diagnosis.
pub const MAX_SEQUENCE: usize = 128;

/// Key capabilities consulted when building the table.
const KEY_CAPS: [(usize, KeyCode); 28] = [
    (cap::STR_KEY_A1, KeyCode::KeypadUpperLeft),
    (cap::STR_KEY_UP, KeyCode::Up),
    (cap::STR_KEY_A3, KeyCode::KeypadUpperRight),
    (cap::STR_KEY_LEFT, KeyCode::Left),
    (cap::STR_KEY_B2, KeyCode::KeypadCenter),
    (cap::STR_KEY_RIGHT, KeyCode::Right),
    (cap::STR_KEY_C1, KeyCode::KeypadLowerLeft),
    (cap::STR_KEY_DOWN, KeyCode::Down),
    (cap::STR_KEY_C3, KeyCode::KeypadLowerRight),
    (cap::STR_KEY_PPAGE, KeyCode::PageUp),
    (cap::STR_KEY_NPAGE, KeyCode::PageDown),
    (cap::STR_KEY_HOME, KeyCode::Home),
    (cap::STR_KEY_END, KeyCode::End),
    (cap::STR_KEY_INSERT, KeyCode::Insert),
    (cap::STR_KEY_DELETE, KeyCode::Delete),
    // Keypad enter; xterm reports it distinctly in keypad-transmit mode.
    (cap::STR_KEY_ENTER, KeyCode::Char('\n')),
    (cap::STR_KEY_F1, KeyCode::F(1)),
    (cap::STR_KEY_F2, KeyCode::F(2)),
    (cap::STR_KEY_F3, KeyCode::F(3)),
    (cap::STR_KEY_F4, KeyCode::F(4)),
    (cap::STR_KEY_F5, KeyCode::F(5)),
    (cap::STR_KEY_F6, KeyCode::F(6)),
    (cap::STR_KEY_F7, KeyCode::F(7)),
    (cap::STR_KEY_F8, KeyCode::F(8)),
    (cap::STR_KEY_F9, KeyCode::F(9)),
    (cap::STR_KEY_F10, KeyCode::F(10)),
    (cap::STR_KEY_F11, KeyCode::F(11)),
    (cap::STR_KEY_F12, KeyCode::F(12)),
];

/// Sorted suffix → key code table derived from the capability store.
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    entries: Vec<(Vec<u8>, KeyCode)>,
}

impl KeyTable {
    /// Build the table from a capability store.
    ///
    /// Capabilities that are absent, or whose value does not start with ESC,
    /// are skipped; an unnamed (empty) store yields an empty table.
    #[must_use]
    pub fn from_database(db: &Database) -> Self {
        if db.name().is_none() {
            return Self::default();
        }

        let mut entries: Vec<(Vec<u8>, KeyCode)> = KEY_CAPS
            .iter()
            .filter_map(|&(ordinal, code)| {
                let value = db.string(ordinal)?;
                match value.split_first() {
                    Some((&0x1B, suffix)) if !suffix.is_empty() => {
                        Some((suffix.to_vec(), code))
                    }
                    _ => None,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);
        Self { entries }
    }

    /// Number of usable entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact-match lookup of a sequence body.
    #[must_use]
    pub fn lookup(&self, body: &[u8]) -> Option<KeyCode> {
        self.entries
            .binary_search_by(|(suffix, _)| suffix.as_slice().cmp(body))
            .ok()
            .map(|i| self.entries[i].1)
    }
}

/// Fold a control byte to its letter, adding CTRL.
///
/// Byte 0 maps to `~`, other control bytes add `@`. Tab, newline, and
/// carriage return pass through untouched. Bytes above 0x1F are returned
/// unchanged.
#[must_use]
pub fn fold_control(byte: u8, mods: &mut Modifiers) -> char {
    if byte > 0x1F || matches!(byte, b'\t' | b'\n' | b'\r') {
        return byte as char;
    }
    mods.insert(Modifiers::CTRL);
    if byte == 0 { '~' } else { (byte + b'@') as char }
}

/// Classify an escape-sequence body.
///
/// `body` excludes the leading ESC. `focus_events` gates the focus-report
/// sequences; when reporting is off they fall through to `Unknown`.
#[must_use]
pub fn classify(body: &[u8], table: &KeyTable, focus_events: bool) -> (KeyCode, Modifiers) {
    let mut mods = Modifiers::empty();

    if body.is_empty() {
        return (KeyCode::Escape, mods);
    }
    if body.len() >= MAX_SEQUENCE - 1 {
        return (KeyCode::Unknown, mods);
    }

    if let Some(code) = table.lookup(body) {
        return (code, mods);
    }

    if body[0] == b'[' && body.len() >= 2 {
        if body.len() == 2 && focus_events {
            match body[1] {
                b'O' => return (KeyCode::FocusOut, mods),
                b'I' => return (KeyCode::FocusIn, mods),
                _ => {}
            }
        }
        // Mouse report shapes: SGR, urxvt, and the 3-byte X10 form.
        if body[1] == b'<'
            || body[body.len() - 1] == b'M'
            || (body[1] == b'M' && body.len() == 5)
        {
            return (KeyCode::Mouse, mods);
        }
    }

    if body.len() == 1 {
        mods.insert(Modifiers::ALT);
        let ch = fold_control(body[0], &mut mods);
        return (KeyCode::Char(ch), mods);
    }

    (KeyCode::Unknown, mods)
}
