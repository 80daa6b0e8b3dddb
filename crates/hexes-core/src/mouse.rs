#![forbid(unsafe_code)]

//! Mouse report parsing and protocol selection.
//!
//! Three wire variants are understood, tried in order of trustworthiness:
//!
//! - **SGR** (`ESC [ < state ; col ; row M|m`): decimal fields, press and
//!   release distinguished by the final byte. The protocol worth using.
//! - **urxvt** (`ESC [ state ; col ; row M`): decimal fields with the button
//!   state biased by 0x20; cannot express release buttons, so events are
//!   flagged [`Modifiers::UNRELIABLE`].
//! - **X10** (`ESC [ M` + three bytes): single-byte fields biased by 0x20
//!   (state) and 0x21 (coordinates); also flagged unreliable.
//!
//! Parsing is pure over the stashed raw sequence (leading ESC included), so
//! the caller fetches the event only after the decoder reported
//! [`crate::event::KeyCode::Mouse`].

use memchr::memchr;

use crate::event::{Modifiers, MouseEvent};

/// Mouse reporting levels, ordered by how much the terminal sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseMode {
    /// No mouse reporting.
    #[default]
    Off,
    /// Button presses only (X10 compatibility level, DECSET 9).
    Press,
    /// Presses and releases (DECSET 1000).
    PressRelease,
    /// Presses, releases, and motion while a button is held (DECSET 1002).
    Drag,
    /// All motion (DECSET 1003).
    All,
}

impl MouseMode {
    /// The DECSET parameter selecting this reporting level, if any.
    #[must_use]
    pub const fn code(self) -> Option<u16> {
        match self {
            Self::Off => None,
            Self::Press => Some(9),
            Self::PressRelease => Some(1000),
            Self::Drag => Some(1002),
            Self::All => Some(1003),
        }
    }
}

/// Parse a stashed mouse report (leading ESC included).
///
/// Returns `None` when the bytes do not form any of the three shapes.
#[must_use]
pub fn parse(raw: &[u8]) -> Option<MouseEvent> {
    if raw.len() < 3 || raw[0] != 0x1B || raw[1] != b'[' {
        return None;
    }

    // SGR: ESC [ < state ; col ; row M|m
    if raw[2] == b'<' {
        let release = *raw.last()? == b'm';
        let (state, x, y) = decimal_fields(&raw[3..raw.len() - 1])?;
        let mut event = decode_state(state, x, y);
        if release {
            event.mods.insert(Modifiers::RELEASE);
        }
        return Some(event);
    }

    // urxvt: ESC [ state ; col ; row M
    if *raw.last()? == b'M' && raw.len() > 3 && raw[2] != b'M' {
        let (state, x, y) = decimal_fields(&raw[2..raw.len() - 1])?;
        let mut event = decode_state(state.checked_sub(0x20)?, x, y);
        event.mods.insert(Modifiers::UNRELIABLE);
        return Some(event);
    }

    // X10: ESC [ M state+0x20 col+0x21 row+0x21
    if raw[2] == b'M' && raw.len() == 6 {
        let state = u32::from(raw[3].wrapping_sub(0x20));
        let x = u16::from(raw[4].wrapping_sub(33));
        let y = u16::from(raw[5].wrapping_sub(33));
        let mut event = decode_state(state, x, y);
        event.mods.insert(Modifiers::UNRELIABLE);
        return Some(event);
    }

    None
}

/// Split `state ; col ; row` decimals; coordinates come back 0-based.
fn decimal_fields(body: &[u8]) -> Option<(u32, u16, u16)> {
    let first = memchr(b';', body)?;
    let second = first + 1 + memchr(b';', &body[first + 1..])?;

    let state = parse_decimal(&body[..first])?;
    let x = parse_decimal(&body[first + 1..second])?;
    let y = parse_decimal(&body[second + 1..])?;
    if x == 0 || y == 0 {
        return None;
    }
    Some((state, u16::try_from(x - 1).ok()?, u16::try_from(y - 1).ok()?))
}

fn parse_decimal(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut n: u32 = 0;
    for &b in bytes {
        n = n.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
    }
    Some(n)
}

/// Decode a protocol button-state field.
///
/// Layout: bits 0-1 button index, bit 2 shift, bit 3 meta, bit 4 ctrl,
/// bit 5 motion, bit 6 wheel. Button value 4 (all index bits with no wheel)
/// is a release with the button unknown.
fn decode_state(state: u32, x: u16, y: u16) -> MouseEvent {
    let mut button = ((state & 3) + 1) as i8;
    // Bits 2..=5 line up with SHIFT/ALT/CTRL/MOTION.
    let mut mods = Modifiers::from_bits_truncate(((state & 0x3C) >> 2) as u8);

    if button == 4 {
        button = 0;
        mods.insert(Modifiers::RELEASE);
    }
    if state & 64 != 0 {
        // Wheel: button 1 is up (-2), button 2 is down (-1).
        button -= 3;
    }

    MouseEvent { button, mods, x, y }
}
