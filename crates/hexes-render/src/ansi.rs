#![forbid(unsafe_code)]

//! ANSI escape sequence generation helpers.
//!
//! Pure byte-generation functions for the control sequences the presenter
//! and mode controller emit. No state tracking lives here; the presenter
//! decides *whether* to emit, these functions decide *what bytes*.
//!
//! An integer parameter equal to 1 is elided everywhere, matching the
//! shortest-encoding goal of the cursor mover.
//!
//! # Sequence Reference
//!
//! | Category | Sequence | Description |
//! |----------|----------|-------------|
//! | CSI | `ESC [ row ; col H` | CUP (cursor position, 1-indexed) |
//! | CSI | `ESC [ col G` | CHA (cursor horizontal absolute) |
//! | CSI | `ESC [ n A/B/C/D` | CUU/CUD/CUF/CUB (relative moves) |
//! | CSI | `ESC [ n E/F` | CNL/CPL (line moves with column reset) |
//! | CSI | `ESC [ n m` | SGR (select graphic rendition) |
//! | CSI | `ESC [ ? 5 h/l` | reverse video |
//! | CSI | `ESC [ ? 1004 h/l` | focus reporting |
//! | CSI | `ESC [ ? n h/l` | mouse protocol selects |
//! | CSI | `ESC [ 8 ; rows ; cols t` | resize request |
//! | CSI | `ESC [ 6 n` | cursor position query |
//! | OSC | `ESC ] 2 ; text ST` | window title |
//! | ESC | `ESC c` | hard reset (RIS) |

use std::io::{self, Write};

use hexes_core::probe::Quirks;

use crate::cell::{Attrs, Color, ColorKind};

/// Cursor to origin, the `H` short form.
pub const HOME: &[u8] = b"\x1b[H";

/// Hard terminal reset (RIS).
pub const HARD_RESET: &[u8] = b"\x1bc";

/// Cursor position query (DSR 6).
pub const CURSOR_QUERY: &[u8] = b"\x1b[6n";

/// Hide cursor, used when the capability store has no `civis`.
pub const CURSOR_HIDE: &[u8] = b"\x1b[?25l";

/// Show cursor, used when the capability store has no `cnorm`/`cvvis`.
pub const CURSOR_SHOW: &[u8] = b"\x1b[?25h";

/// Turn on the urxvt and SGR mouse coordinate encodings. SGR wins where
/// both exist; urxvt is the fallback for terminals without 1006.
pub const MOUSE_ENCODINGS: &[u8] = b"\x1b[?1015h\x1b[?1006h";

/// Write a numeric parameter, eliding 1.
fn param<W: Write>(w: &mut W, n: u32) -> io::Result<()> {
    if n == 1 { Ok(()) } else { write!(w, "{n}") }
}

/// CUP (cursor position): `CSI row ; col H`, 0-indexed input.
pub fn cup<W: Write>(w: &mut W, x: u16, y: u16) -> io::Result<()> {
    w.write_all(b"\x1b[")?;
    param(w, u32::from(y) + 1)?;
    w.write_all(b";")?;
    param(w, u32::from(x) + 1)?;
    w.write_all(b"H")
}

/// CHA (cursor horizontal absolute): `CSI col G`, 0-indexed input.
pub fn cha<W: Write>(w: &mut W, x: u16) -> io::Result<()> {
    w.write_all(b"\x1b[")?;
    param(w, u32::from(x) + 1)?;
    w.write_all(b"G")
}

fn relative<W: Write>(w: &mut W, n: u16, letter: u8) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    w.write_all(b"\x1b[")?;
    param(w, u32::from(n))?;
    w.write_all(&[letter])
}

/// CUU (cursor up): `CSI n A`.
pub fn cuu<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    relative(w, n, b'A')
}

/// CUD (cursor down): `CSI n B`.
pub fn cud<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    relative(w, n, b'B')
}

/// CUF (cursor forward): `CSI n C`.
pub fn cuf<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    relative(w, n, b'C')
}

/// CUB (cursor back): `CSI n D`.
pub fn cub<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    relative(w, n, b'D')
}

/// CNL (cursor next line, column reset): `CSI n E`.
pub fn cnl<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    relative(w, n, b'E')
}

/// CPL (cursor previous line, column reset): `CSI n F`.
pub fn cpl<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    relative(w, n, b'F')
}

// =============================================================================
// SGR parameters
// =============================================================================

/// Write the SGR parameter text selecting `color`, without CSI framing.
///
/// Returns whether the color needs bold asserted as well (the bright half of
/// the standard palette folds into bold + normal code). Under
/// [`Quirks::NO_DEFAULT_COLORS`] the default color substitutes a concrete
/// palette entry — white foreground, black background — because SGR 39/49
/// would be swallowed.
pub fn sgr_color<W: Write>(
    w: &mut W,
    color: Color,
    is_fg: bool,
    quirks: Quirks,
) -> io::Result<bool> {
    let no_defaults = quirks.contains(Quirks::NO_DEFAULT_COLORS);
    match color.kind() {
        ColorKind::Default | ColorKind::Ansi(_) => {
            let index = match color.kind() {
                ColorKind::Ansi(n) => u32::from(n),
                _ => 0,
            };
            let mut needs_bold = false;
            let code = if is_fg {
                if index <= 8 {
                    let index = if index == 0 {
                        if no_defaults { 8 } else { 10 }
                    } else {
                        index
                    };
                    index + 29
                } else {
                    needs_bold = true;
                    index + 21
                }
            } else if index <= 8 {
                let index = if index == 0 {
                    if no_defaults { 1 } else { 10 }
                } else {
                    index
                };
                index + 39
            } else {
                index + 91
            };
            write!(w, "{code}")?;
            Ok(needs_bold)
        }
        ColorKind::Indexed(n) => {
            write!(w, "{}8;5;{n}", if is_fg { '3' } else { '4' })?;
            Ok(false)
        }
        ColorKind::Rgb(r, g, b) => {
            write!(w, "{}8;2;{r};{g};{b}", if is_fg { '3' } else { '4' })?;
            Ok(false)
        }
    }
}

/// The SGR code toggling a single attribute bit.
///
/// Codes run `bit index + 1` up to blink, then skip rapid-blink (which
/// neither this library nor most terminals support), so `+ 2` above. The
/// unset form adds 20.
#[must_use]
pub fn sgr_attr_code(attr: Attrs, unset: bool) -> u8 {
    let index = attr.bits().trailing_zeros() as u8;
    let code = if index < 5 { index + 1 } else { index + 2 };
    if unset { code + 20 } else { code }
}

// =============================================================================
// Mode control
// =============================================================================

/// Reverse video: `CSI ? 5 h/l`.
pub fn reverse_video<W: Write>(w: &mut W, on: bool) -> io::Result<()> {
    write!(w, "\x1b[?5{}", if on { 'h' } else { 'l' })
}

/// Focus event reporting: `CSI ? 1004 h/l`.
pub fn focus_reporting<W: Write>(w: &mut W, on: bool) -> io::Result<()> {
    write!(w, "\x1b[?1004{}", if on { 'h' } else { 'l' })
}

/// Select or deselect a mouse reporting level by its DECSET parameter.
pub fn mouse_level<W: Write>(w: &mut W, code: u16, on: bool) -> io::Result<()> {
    write!(w, "\x1b[?{code}{}", if on { 'h' } else { 'l' })
}

/// Request a terminal resize: `CSI 8 ; rows ; cols t`.
pub fn resize_request<W: Write>(w: &mut W, cols: u16, rows: u16) -> io::Result<()> {
    write!(w, "\x1b[8;{rows};{cols}t")
}

/// Set the window title (OSC 2, ST-terminated).
pub fn window_title<W: Write>(w: &mut W, title: &str) -> io::Result<()> {
    write!(w, "\x1b]2;{title}\x1b\\")
}

/// Set the icon name (OSC 1, ST-terminated).
pub fn icon_name<W: Write>(w: &mut W, icon: &str) -> io::Result<()> {
    write!(w, "\x1b]1;{icon}\x1b\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> Vec<u8> {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        buf
    }

    fn color_param(color: Color, is_fg: bool, quirks: Quirks) -> (Vec<u8>, bool) {
        let mut buf = Vec::new();
        let bold = sgr_color(&mut buf, color, is_fg, quirks).unwrap();
        (buf, bold)
    }

    #[test]
    fn cup_elides_ones() {
        assert_eq!(to_bytes(|w| cup(w, 0, 0)), b"\x1b[;H");
        assert_eq!(to_bytes(|w| cup(w, 4, 0)), b"\x1b[;5H");
        assert_eq!(to_bytes(|w| cup(w, 0, 1)), b"\x1b[2;H");
        assert_eq!(to_bytes(|w| cup(w, 79, 23)), b"\x1b[24;80H");
    }

    #[test]
    fn cha_elides_one() {
        assert_eq!(to_bytes(|w| cha(w, 0)), b"\x1b[G");
        assert_eq!(to_bytes(|w| cha(w, 6)), b"\x1b[7G");
    }

    #[test]
    fn relative_moves() {
        assert_eq!(to_bytes(|w| cuu(w, 1)), b"\x1b[A");
        assert_eq!(to_bytes(|w| cuu(w, 5)), b"\x1b[5A");
        assert_eq!(to_bytes(|w| cud(w, 2)), b"\x1b[2B");
        assert_eq!(to_bytes(|w| cuf(w, 1)), b"\x1b[C");
        assert_eq!(to_bytes(|w| cub(w, 3)), b"\x1b[3D");
        assert_eq!(to_bytes(|w| cnl(w, 1)), b"\x1b[E");
        assert_eq!(to_bytes(|w| cpl(w, 4)), b"\x1b[4F");
    }

    #[test]
    fn relative_zero_is_noop() {
        assert_eq!(to_bytes(|w| cuu(w, 0)), b"");
        assert_eq!(to_bytes(|w| cuf(w, 0)), b"");
    }

    #[test]
    fn standard_colors() {
        let (p, bold) = color_param(Color::ansi(1), true, Quirks::empty());
        assert_eq!(p, b"30");
        assert!(!bold);

        let (p, _) = color_param(Color::ansi(8), true, Quirks::empty());
        assert_eq!(p, b"37");

        let (p, _) = color_param(Color::ansi(1), false, Quirks::empty());
        assert_eq!(p, b"40");
        let (p, _) = color_param(Color::ansi(8), false, Quirks::empty());
        assert_eq!(p, b"47");
    }

    #[test]
    fn bright_foreground_needs_bold() {
        let (p, bold) = color_param(Color::ansi(9), true, Quirks::empty());
        assert_eq!(p, b"30");
        assert!(bold);
        let (p, bold) = color_param(Color::ansi(16), true, Quirks::empty());
        assert_eq!(p, b"37");
        assert!(bold);
    }

    #[test]
    fn bright_background_uses_aixterm_codes() {
        let (p, bold) = color_param(Color::ansi(9), false, Quirks::empty());
        assert_eq!(p, b"100");
        assert!(!bold);
        let (p, _) = color_param(Color::ansi(16), false, Quirks::empty());
        assert_eq!(p, b"107");
    }

    #[test]
    fn default_colors() {
        let (p, _) = color_param(Color::DEFAULT, true, Quirks::empty());
        assert_eq!(p, b"39");
        let (p, _) = color_param(Color::DEFAULT, false, Quirks::empty());
        assert_eq!(p, b"49");
    }

    #[test]
    fn default_colors_substitute_under_quirk() {
        let (p, _) = color_param(Color::DEFAULT, true, Quirks::NO_DEFAULT_COLORS);
        assert_eq!(p, b"37");
        let (p, _) = color_param(Color::DEFAULT, false, Quirks::NO_DEFAULT_COLORS);
        assert_eq!(p, b"40");
    }

    #[test]
    fn extended_colors() {
        let (p, _) = color_param(Color::indexed(196), true, Quirks::empty());
        assert_eq!(p, b"38;5;196");
        let (p, _) = color_param(Color::indexed(0), false, Quirks::empty());
        assert_eq!(p, b"48;5;0");
        let (p, _) = color_param(Color::rgb(255, 128, 0), true, Quirks::empty());
        assert_eq!(p, b"38;2;255;128;0");
        let (p, _) = color_param(Color::rgb(1, 2, 3), false, Quirks::empty());
        assert_eq!(p, b"48;2;1;2;3");
    }

    #[test]
    fn attr_codes_skip_rapid_blink() {
        assert_eq!(sgr_attr_code(Attrs::BOLD, false), 1);
        assert_eq!(sgr_attr_code(Attrs::FAINT, false), 2);
        assert_eq!(sgr_attr_code(Attrs::ITALIC, false), 3);
        assert_eq!(sgr_attr_code(Attrs::UNDERLINE, false), 4);
        assert_eq!(sgr_attr_code(Attrs::BLINK, false), 5);
        assert_eq!(sgr_attr_code(Attrs::INVERSE, false), 7);
        assert_eq!(sgr_attr_code(Attrs::INVISIBLE, false), 8);
        assert_eq!(sgr_attr_code(Attrs::CROSSED, false), 9);
    }

    #[test]
    fn attr_unset_codes_add_twenty() {
        assert_eq!(sgr_attr_code(Attrs::FAINT, true), 22);
        assert_eq!(sgr_attr_code(Attrs::ITALIC, true), 23);
        assert_eq!(sgr_attr_code(Attrs::UNDERLINE, true), 24);
        assert_eq!(sgr_attr_code(Attrs::BLINK, true), 25);
        assert_eq!(sgr_attr_code(Attrs::INVERSE, true), 27);
        assert_eq!(sgr_attr_code(Attrs::INVISIBLE, true), 28);
        assert_eq!(sgr_attr_code(Attrs::CROSSED, true), 29);
    }

    #[test]
    fn attr_set_then_unset_round_trips() {
        // For every attribute bit, on-code and off-code pair up 20 apart,
        // which is what lets set/unset cancel from the zero state.
        for attr in [
            Attrs::FAINT,
            Attrs::ITALIC,
            Attrs::UNDERLINE,
            Attrs::BLINK,
            Attrs::INVERSE,
            Attrs::INVISIBLE,
            Attrs::CROSSED,
        ] {
            assert_eq!(
                u16::from(sgr_attr_code(attr, true)),
                u16::from(sgr_attr_code(attr, false)) + 20
            );
        }
    }

    #[test]
    fn mode_sequences() {
        assert_eq!(to_bytes(|w| reverse_video(w, true)), b"\x1b[?5h");
        assert_eq!(to_bytes(|w| reverse_video(w, false)), b"\x1b[?5l");
        assert_eq!(to_bytes(|w| focus_reporting(w, true)), b"\x1b[?1004h");
        assert_eq!(to_bytes(|w| focus_reporting(w, false)), b"\x1b[?1004l");
        assert_eq!(to_bytes(|w| mouse_level(w, 1002, true)), b"\x1b[?1002h");
        assert_eq!(to_bytes(|w| mouse_level(w, 1000, false)), b"\x1b[?1000l");
    }

    #[test]
    fn osc_sequences_are_st_terminated() {
        assert_eq!(
            to_bytes(|w| window_title(w, "demo")),
            b"\x1b]2;demo\x1b\\"
        );
        assert_eq!(to_bytes(|w| icon_name(w, "d")), b"\x1b]1;d\x1b\\");
    }

    #[test]
    fn resize_request_order_is_rows_then_cols() {
        assert_eq!(to_bytes(|w| resize_request(w, 80, 24)), b"\x1b[8;24;80t");
    }
}
