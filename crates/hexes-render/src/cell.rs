#![forbid(unsafe_code)]

//! Cell, color, and attribute types.
//!
//! The `Cell` is the unit of the terminal grid: one UTF-8 codepoint of up to
//! four bytes plus foreground, background, and an attribute set. Each cell
//! occupies 16 bytes, so buffers compare and copy as flat memory.
//!
//! # Color encoding
//!
//! A color is one `u32` with three encodings overlaid:
//!
//! | Range | Meaning |
//! |---|---|
//! | `0` | terminal default |
//! | `1..=16` | standard palette (`9..=16` bright) |
//! | `17..=272` | 256-color index `n - 17` |
//! | `273..273+2^24` | packed RGB `(n - 273)` as `R<<16 \| G<<8 \| B` |
//!
//! # Codepoint invariant
//!
//! The `cp` bytes hold a whole UTF-8 unit or nothing: bytes past the encoded
//! length are always NUL, and a multi-byte sequence is never truncated
//! mid-unit. All-NUL means "blank", which the presenter renders as a space.

use bitflags::bitflags;

/// First 256-color value; palette index `n` encodes as `n + 17`.
pub const COLOR_OFFSET_256: u32 = 17;

/// First direct-color value; RGB packs above this.
pub const COLOR_OFFSET_RGB: u32 = 273;

bitflags! {
    /// Display attribute bits, positioned for SGR interop: the code for bit
    /// `i` is `i + 1` below the rapid-blink gap and `i + 2` above it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attrs: u8 {
        const BOLD = 1;
        const FAINT = 2;
        const ITALIC = 4;
        const UNDERLINE = 8;
        const BLINK = 16;
        const INVERSE = 32;
        const INVISIBLE = 64;
        const CROSSED = 128;
    }
}

/// A terminal color in the single-integer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Color(u32);

/// A [`Color`] split back into its encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorKind {
    /// The terminal's default color.
    Default,
    /// Standard palette entry, `1..=16`.
    Ansi(u8),
    /// 256-color palette index, `0..=255`.
    Indexed(u8),
    /// Direct color.
    Rgb(u8, u8, u8),
}

impl Color {
    /// The terminal default.
    pub const DEFAULT: Self = Self(0);

    /// A standard palette color. `1..=8` are the normal shades, `9..=16`
    /// the bright ones (which the encoder folds into bold + normal code).
    #[must_use]
    pub const fn ansi(index: u8) -> Self {
        debug_assert!(index >= 1 && index <= 16, "palette index out of range");
        Self(index as u32)
    }

    /// A 256-color palette index.
    #[must_use]
    pub const fn indexed(index: u8) -> Self {
        Self(COLOR_OFFSET_256 + index as u32)
    }

    /// A direct color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(COLOR_OFFSET_RGB + ((r as u32) << 16 | (g as u32) << 8 | b as u32))
    }

    /// The raw integer encoding.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Rebuild from a raw integer.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Whether this is the terminal default.
    #[must_use]
    pub const fn is_default(self) -> bool {
        self.0 == 0
    }

    /// Split back into the encoding the integer falls in.
    #[must_use]
    pub const fn kind(self) -> ColorKind {
        match self.0 {
            0 => ColorKind::Default,
            n if n < COLOR_OFFSET_256 => ColorKind::Ansi(n as u8),
            n if n < COLOR_OFFSET_RGB => ColorKind::Indexed((n - COLOR_OFFSET_256) as u8),
            n => {
                let packed = n - COLOR_OFFSET_RGB;
                ColorKind::Rgb(
                    ((packed >> 16) & 0xFF) as u8,
                    ((packed >> 8) & 0xFF) as u8,
                    (packed & 0xFF) as u8,
                )
            }
        }
    }
}

/// UTF-8 unit length from the first byte.
///
/// Continuation bytes (0x80..0xBF) are technically invalid leads; they pass
/// through as length 1 rather than being rejected. With `unicode` off every
/// byte is its own unit.
#[must_use]
pub const fn utf8_len(first: u8, unicode: bool) -> usize {
    if !unicode || first < 0xC0 {
        1
    } else if first < 0xE0 {
        2
    } else if first < 0xF0 {
        3
    } else {
        4
    }
}

/// One terminal grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    /// UTF-8 codepoint bytes, NUL-padded. All-NUL is blank.
    pub cp: [u8; 4],
    /// Foreground color.
    pub fg: Color,
    /// Background color.
    pub bg: Color,
    /// Attribute set.
    pub attrs: Attrs,
}

impl Cell {
    /// An empty cell with default colors and no attributes.
    pub const BLANK: Self = Self {
        cp: [0; 4],
        fg: Color::DEFAULT,
        bg: Color::DEFAULT,
        attrs: Attrs::empty(),
    };

    /// Build a cell from the first codepoint of `cp` and a style.
    #[must_use]
    pub fn new(cp: &str, fg: Color, bg: Color, attrs: Attrs) -> Self {
        let mut cell = Self {
            cp: [0; 4],
            fg,
            bg,
            attrs,
        };
        cell.set_codepoint(cp.as_bytes(), true);
        cell
    }

    /// Write the leading codepoint of `bytes` into the cell.
    ///
    /// Takes `utf8_len` bytes (clamped to what is available) and NUL-fills
    /// the tail, so a shorter codepoint never leaves stale bytes behind.
    pub fn set_codepoint(&mut self, bytes: &[u8], unicode: bool) {
        self.cp = [0; 4];
        if let Some(&first) = bytes.first() {
            let len = utf8_len(first, unicode).min(bytes.len());
            self.cp[..len].copy_from_slice(&bytes[..len]);
        }
    }

    /// The codepoint bytes, without the NUL padding.
    #[must_use]
    pub fn codepoint(&self) -> &[u8] {
        let len = self.cp.iter().position(|&b| b == 0).unwrap_or(4);
        &self.cp[..len]
    }

    /// Whether the cell holds no codepoint.
    #[must_use]
    pub const fn is_blank(&self) -> bool {
        self.cp[0] == 0
    }
}
