#![forbid(unsafe_code)]

//! Canonical input event types.
//!
//! Keys, modifier bits, and mouse events as the decoder reports them. All
//! types derive `Clone`, `Copy`, `PartialEq`, and `Eq` for use in tests and
//! pattern matching.
//!
//! # Design Notes
//!
//! - Mouse coordinates are 0-indexed (the wire protocols are 1-indexed).
//! - Non-physical occurrences (resize, restore-after-suspend, focus changes,
//!   "a mouse report is ready") travel in the same stream as key presses, so
//!   they are [`KeyCode`] variants rather than a separate channel.
//! - `Modifiers` use bitflags for easy combination.

use bitflags::bitflags;

bitflags! {
    /// Modifier keys and report qualifiers attached to an event.
    ///
    /// `MOTION`, `RELEASE`, and `UNRELIABLE` only appear on mouse events:
    /// motion-while-pressed, button release, and "this protocol variant is
    /// known to misreport state" respectively.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1;
        const ALT = 2;
        const CTRL = 4;
        const MOTION = 8;
        const RELEASE = 16;
        const UNRELIABLE = 32;
    }
}

/// Key codes for decoded input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A regular character key. Control bytes are folded to their letter with
    /// [`Modifiers::CTRL`] set before reaching this variant.
    Char(char),

    /// A bare Escape key (an ESC byte with no sequence body behind it).
    Escape,

    /// Up arrow key.
    Up,

    /// Down arrow key.
    Down,

    /// Left arrow key.
    Left,

    /// Right arrow key.
    Right,

    /// Home key.
    Home,

    /// End key.
    End,

    /// Page Up key.
    PageUp,

    /// Page Down key.
    PageDown,

    /// Insert key.
    Insert,

    /// Delete key.
    Delete,

    /// Keypad upper-left (the terminfo `ka1` position).
    KeypadUpperLeft,

    /// Keypad upper-right (`ka3`).
    KeypadUpperRight,

    /// Keypad center (`kb2`).
    KeypadCenter,

    /// Keypad lower-left (`kc1`).
    KeypadLowerLeft,

    /// Keypad lower-right (`kc3`).
    KeypadLowerRight,

    /// Function key (F1-F12).
    F(u8),

    /// The terminal gained focus.
    FocusIn,

    /// The terminal lost focus.
    FocusOut,

    /// The terminal was resized; buffers have already been re-fit.
    Resize,

    /// The process resumed after a host suspend; terminal state was
    /// re-asserted and a full redraw is in order.
    Restore,

    /// A mouse report arrived. Fetch the decoded event with the follow-up
    /// mouse accessor.
    Mouse,

    /// An escape sequence the decoder does not understand. The raw bytes
    /// remain retrievable for diagnosis.
    Unknown,
}

/// A decoded keyboard (or pseudo-key) event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key code.
    pub code: KeyCode,

    /// Modifier keys held during the event.
    pub mods: Modifiers,
}

impl KeyEvent {
    /// Create a new key event with no modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            mods: Modifiers::empty(),
        }
    }

    /// Attach modifiers.
    #[must_use]
    pub const fn with_mods(mut self, mods: Modifiers) -> Self {
        self.mods = mods;
        self
    }

    /// Check if this is a specific character key.
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        matches!(self.code, KeyCode::Char(ch) if ch == c)
    }

    /// Check if Ctrl is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.mods.contains(Modifiers::CTRL)
    }

    /// Check if Alt is held.
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.mods.contains(Modifiers::ALT)
    }

    /// Check if Shift is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.mods.contains(Modifiers::SHIFT)
    }
}

/// A decoded mouse event.
///
/// `button` is 1-based for physical buttons. Wheel motion reports as the
/// pseudo-buttons `-2` (wheel up) and `-1` (wheel down); a release with no
/// identifiable button reports as `0` with [`Modifiers::RELEASE`] set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// Button index; see the type docs for the pseudo-button values.
    pub button: i8,

    /// Shift/Alt/Ctrl plus the motion/release/unreliable qualifiers.
    pub mods: Modifiers,

    /// Column, 0-indexed.
    pub x: u16,

    /// Row, 0-indexed.
    pub y: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_bits_match_wire_values() {
        assert_eq!(Modifiers::SHIFT.bits(), 1);
        assert_eq!(Modifiers::ALT.bits(), 2);
        assert_eq!(Modifiers::CTRL.bits(), 4);
        assert_eq!(Modifiers::MOTION.bits(), 8);
        assert_eq!(Modifiers::RELEASE.bits(), 16);
        assert_eq!(Modifiers::UNRELIABLE.bits(), 32);
    }

    #[test]
    fn key_event_helpers() {
        let ev = KeyEvent::new(KeyCode::Char('q')).with_mods(Modifiers::CTRL | Modifiers::ALT);
        assert!(ev.is_char('q'));
        assert!(!ev.is_char('x'));
        assert!(ev.ctrl());
        assert!(ev.alt());
        assert!(!ev.shift());
    }

    #[test]
    fn function_keys_are_distinct() {
        assert_ne!(KeyCode::F(1), KeyCode::F(2));
        assert_eq!(KeyCode::F(12), KeyCode::F(12));
    }
}
