#![forbid(unsafe_code)]

//! Startup terminal probing: quirks, Unicode, and color depth.
//!
//! Probing runs once during init, after raw input mode is active, by writing
//! small query scripts and measuring what the terminal reports back. Every
//! read is bounded by a millisecond deadline; a terminal that never answers
//! the first cursor-position query skips all remaining probes.
//!
//! The probes talk through [`ProbeIo`] rather than a file descriptor, so the
//! whole script is testable against a scripted terminal.
//!
//! # Fail-open contract
//!
//! A timeout or malformed reply stops the script and leaves the quirks
//! gathered so far; the corresponding quirk is simply assumed absent. I/O
//! failures are swallowed the same way — init proceeds with what was learned.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::terminfo::{Database, cap};

/// Per-step reply deadline.
pub const DETECT_TIMEOUT_MS: i32 = 100;

/// Replies are short; this bounds the reply scratch buffer.
const REPLY_MAX: usize = 16;

/// Color count encoding offset shared with the cell model: a 256-color
/// terminal reports its highest palette index plus this offset.
pub const COLOR_COUNT_OFFSET: u32 = 17;

/// Direct-color ("truecolor") color count.
pub const TRUECOLOR: u32 = 1 << 24;

bitflags! {
    /// Divergences from strict ANSI the encoder must accommodate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Quirks: u8 {
        /// CNL/CPL (line-relative movement with column reset) work.
        const LINE_CODES = 1;
        /// CHA (absolute column) works.
        const ABS_COLUMN = 2;
        /// The right-edge deferred-wrap state needs an explicit cursor-left
        /// to clear; a single cursor-right is not enough.
        const WRAP_FIX = 4;
        /// The terminal answers cursor-position queries.
        const CURSOR_REPORT = 8;
        /// SGR 39/49 (default colors) are not understood.
        const NO_DEFAULT_COLORS = 16;
    }
}

/// Byte transport the probes run over.
///
/// `send` must deliver the bytes to the terminal before returning (probes
/// are question/answer). `recv_byte` returns `Ok(None)` on deadline expiry.
pub trait ProbeIo {
    /// Write and flush a probe query.
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Read one reply byte, waiting at most `timeout_ms`.
    fn recv_byte(&mut self, timeout_ms: i32) -> std::io::Result<Option<u8>>;
}

/// Outcome of waiting for a terminated reply.
enum Reply {
    Complete(SmallVec<[u8; REPLY_MAX]>),
    Timeout,
}

/// Collect bytes until `end` arrives or the deadline passes.
///
/// Bytes beyond the scratch capacity are dropped, matching the fixed reply
/// buffer the queries were sized for.
fn read_reply(io: &mut impl ProbeIo, end: u8) -> std::io::Result<Reply> {
    let mut reply = SmallVec::new();
    loop {
        match io.recv_byte(DETECT_TIMEOUT_MS)? {
            None => return Ok(Reply::Timeout),
            Some(byte) => {
                if reply.len() < REPLY_MAX {
                    reply.push(byte);
                }
                if byte == end {
                    return Ok(Reply::Complete(reply));
                }
            }
        }
    }
}

/// Parse a cursor-position report (`ESC [ row ; col R`), 1-based on the
/// wire, returned 0-based as `(x, y)`.
#[must_use]
pub fn parse_cursor_report(reply: &[u8]) -> Option<(u16, u16)> {
    let bracket = reply.iter().position(|&b| b == b'[')?;
    let rest = &reply[bracket + 1..];
    let semi = rest.iter().position(|&b| b == b';')?;

    let row = ascii_number(&rest[..semi])?;
    let end = rest
        .iter()
        .position(|&b| !b.is_ascii_digit() && b != b';')
        .unwrap_or(rest.len());
    let col = ascii_number(&rest[semi + 1..end])?;

    if row == 0 || col == 0 {
        return None;
    }
    Some((col - 1, row - 1))
}

fn ascii_number(bytes: &[u8]) -> Option<u16> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut n: u16 = 0;
    for &b in bytes {
        n = n.checked_mul(10)?.checked_add(u16::from(b - b'0'))?;
    }
    Some(n)
}

/// Query the cursor position; `None` on timeout or a malformed reply.
fn query_position(io: &mut impl ProbeIo) -> std::io::Result<Option<(u16, u16)>> {
    io.send(b"\x1b[6n")?;
    match read_reply(io, b'R')? {
        Reply::Timeout => Ok(None),
        Reply::Complete(reply) => Ok(parse_cursor_report(&reply)),
    }
}

/// Detect quirks by exchanging cursor-position queries.
///
/// `term_name` feeds the hardcoded overrides (NetBSD's VT100 console lacks
/// the default-color codes and there is no way to probe that). The probe
/// script needs at least a 3×2 grid to move around in.
pub fn detect_quirks(io: &mut impl ProbeIo, term_name: Option<&str>, width: u16, height: u16) -> Quirks {
    let mut quirks = Quirks::empty();
    if term_name.is_some_and(|t| t.eq_ignore_ascii_case("vt100")) {
        quirks |= Quirks::NO_DEFAULT_COLORS;
    }
    if width < 3 || height < 2 {
        return quirks;
    }
    let _ = run_quirk_script(io, &mut quirks, width);
    #[cfg(feature = "tracing")]
    tracing::debug!(?quirks, "quirk probe finished");
    quirks
}

fn run_quirk_script(io: &mut impl ProbeIo, quirks: &mut Quirks, width: u16) -> std::io::Result<()> {
    // Can we get the cursor position at all? Without it, none of the
    // remaining measurements are possible.
    let Some((x, _)) = query_position(io)? else {
        return Ok(());
    };
    quirks.insert(Quirks::CURSOR_REPORT);

    // CHA. Make sure we are not already at column 0, ask for column 0
    // absolutely, and see where the cursor lands.
    if x == 0 {
        io.send(b"\x1b[C")?;
    }
    io.send(b"\x1b[G")?;
    let Some((x, y)) = query_position(io)? else {
        return Ok(());
    };
    if x == 0 {
        quirks.insert(Quirks::ABS_COLUMN);
        io.send(b"\x1b[C")?;
    }

    // CNL/CPL. Move one line (up when possible, down from the top row) and
    // require the column to reset to 0. Having either implies both.
    let expected = if y > 0 {
        io.send(b"\x1b[F")?;
        y - 1
    } else {
        io.send(b"\x1b[E")?;
        y + 1
    };
    let Some((x, y)) = query_position(io)? else {
        return Ok(());
    };
    if x == 0 && y == expected {
        quirks.insert(Quirks::LINE_CODES);
    }

    // Wrapping. Park on the right edge, then check whether a lone
    // cursor-right is enough to leave the deferred-wrap state.
    io.send(b"\x1b[?7h")?;
    io.send(format!("\x1b[{width}C \x1b[C ").as_bytes())?;
    let report = query_position(io)?;
    io.send(b"\r")?;
    let Some((x, _)) = report else {
        return Ok(());
    };
    if x != width - 1 {
        quirks.insert(Quirks::WRAP_FIX);
    }

    Ok(())
}

/// Probe Unicode support by writing a snowman and measuring the cursor.
///
/// Returns `None` when the terminal cannot be measured (no cursor reports
/// or a too-narrow grid), `Some(true)` when the three UTF-8 bytes advanced
/// the cursor exactly one column. A terminal that stops answering mid-probe
/// is taken at its earlier word and counted as supporting Unicode.
pub fn detect_unicode(io: &mut impl ProbeIo, quirks: Quirks, width: u16) -> std::io::Result<Option<bool>> {
    if !quirks.contains(Quirks::CURSOR_REPORT) || width < 3 {
        return Ok(None);
    }

    io.send(b"\r\xE2\x98\x83\x1b[6n\x1b[1K\r")?;
    match read_reply(io, b'R')? {
        Reply::Timeout => Ok(Some(true)),
        Reply::Complete(reply) => match parse_cursor_report(&reply) {
            None => Ok(None),
            Some((x, _)) => Ok(Some(x == 1)),
        },
    }
}

/// Ask whether the xterm palette has an entry for `color`.
///
/// The terminal acknowledges `ESC ] 4 ; N ; ? ESC \` with a string-terminated
/// reply iff `N` exists. `None` means no reply (unsupported).
fn xterm_color_ack(io: &mut impl ProbeIo, color: u32) -> std::io::Result<bool> {
    io.send(format!("\x1b]4;{color};?\x1b\\").as_bytes())?;
    match read_reply(io, b'\\')? {
        Reply::Timeout => Ok(false),
        Reply::Complete(_) => Ok(true),
    }
}

/// Detect the color count.
///
/// In order: the `COLORTERM` convention for direct color, a binary search of
/// the xterm palette query (some terminals answer these very slowly, hence
/// log-many queries instead of 256), then the capability store's `colors`
/// number. The result uses the cell-color integer scale: `0` unknown,
/// [`TRUECOLOR`], or highest palette index plus [`COLOR_COUNT_OFFSET`].
pub fn detect_colors(
    io: &mut impl ProbeIo,
    db: &Database,
    colorterm: Option<&str>,
) -> std::io::Result<u32> {
    if matches!(colorterm, Some("truecolor") | Some("24bit")) {
        return Ok(TRUECOLOR);
    }

    if xterm_color_ack(io, 0)? {
        let mut lo = 0u32;
        let mut hi = 255u32;
        while lo + 1 < hi {
            let mid = (lo + hi) / 2;
            if xterm_color_ack(io, mid)? {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        return Ok(hi + COLOR_COUNT_OFFSET);
    }

    match db.number(cap::NUM_MAX_COLORS) {
        Some(n) if n > 0 => Ok(n as u32 + COLOR_COUNT_OFFSET),
        _ => Ok(0),
    }
}
