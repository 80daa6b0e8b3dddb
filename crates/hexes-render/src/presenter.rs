#![forbid(unsafe_code)]

//! Presenter: state-tracked minimal ANSI emission.
//!
//! The presenter owns the shadow buffer — the library's model of what the
//! physical terminal currently shows — and reconciles the pending buffer
//! against it. Its cursor and style fields are treated as authoritative for
//! the terminal, so every emitted sequence is the shortest delta from that
//! model.
//!
//! # Design
//!
//! - **Shortest move wins**: the cursor mover walks a decision ladder from
//!   "no output" through single relative steps, absolute column, the `H`
//!   short form, line-relative moves, and finally the two-parameter CUP,
//!   gated on the probed [`Quirks`].
//! - **One SGR per cell run**: color and attribute deltas combine into a
//!   single SGR sequence; bright foregrounds fold into bold, and bold is
//!   never turned off directly (SGR 21 is widely broken) — the faint-family
//!   reset stands in.
//! - **Right-edge sticky**: a glyph at the last column leaves the model in a
//!   deferred-wrap state instead of wrapping, because many terminals do the
//!   same. Moves that change rows clear it first, with an extra cursor-left
//!   under [`Quirks::WRAP_FIX`].
//! - **Commit after write**: emission goes to an internal byte sink; the
//!   shadow cells and the damage map are only synchronized once the sink
//!   reaches the terminal, so a failed flush leaves damage intact and a
//!   retry meaningful.

use std::io::{self, Write};
use std::mem;

use hexes_core::probe::Quirks;
use smallvec::SmallVec;

use crate::ansi;
use crate::buffer::Buffer;
use crate::cell::{Attrs, Cell, Color, COLOR_OFFSET_256};
use crate::damage::DamageMap;

/// Output sink headroom per cell; the sink is sized `W * H * 64` and grown
/// on resize, enough for a move, a worst-case SGR, and a glyph every cell.
const BYTES_PER_CELL: usize = 64;

/// What a full redraw reads from.
pub enum RedrawSource<'a> {
    /// Rewrite from the pending buffer and synchronize the shadow (and
    /// damage map) on completion.
    Pending {
        buffer: &'a Buffer,
        damage: &'a mut DamageMap,
    },
    /// Rewrite the shadow's own idea of the screen, e.g. after a resume
    /// when the content is still current but the terminal forgot it.
    Shadow,
}

/// State-tracking ANSI emitter over a shadow buffer.
#[derive(Debug)]
pub struct Presenter {
    shadow: Buffer,
    quirks: Quirks,
    on_right_edge: bool,
    out_buf: Vec<u8>,
    synced: Vec<usize>,
}

impl Presenter {
    /// Create a presenter for a `width x height` terminal.
    ///
    /// The shadow starts blank and the model cursor starts *unknown*, so
    /// the first flush emits an absolute position before anything else.
    #[must_use]
    pub fn new(width: u16, height: u16, quirks: Quirks) -> Self {
        let mut shadow = Buffer::new(width, height);
        shadow.move_to(-1, -1);
        Self {
            shadow,
            quirks,
            on_right_edge: false,
            out_buf: Vec::with_capacity(width as usize * height as usize * BYTES_PER_CELL),
            synced: Vec::new(),
        }
    }

    /// The probed quirks in effect.
    #[must_use]
    pub const fn quirks(&self) -> Quirks {
        self.quirks
    }

    /// The shadow buffer (what the terminal is believed to show).
    #[must_use]
    pub fn shadow(&self) -> &Buffer {
        &self.shadow
    }

    /// Whether the model cursor sits in the deferred-wrap state.
    #[must_use]
    pub const fn on_right_edge(&self) -> bool {
        self.on_right_edge
    }

    /// Re-fit the shadow to a resized terminal.
    ///
    /// The physical cursor position after a resize is anyone's guess, so
    /// the model cursor goes back to unknown and the next move is absolute.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.shadow.resize(width, height);
        self.shadow.move_to(-1, -1);
        self.on_right_edge = false;
        let want = width as usize * height as usize * BYTES_PER_CELL;
        if self.out_buf.capacity() < want {
            self.out_buf.reserve(want - self.out_buf.len());
        }
    }

    /// Emit the shortest correct move to `(x, y)`.
    ///
    /// Decision ladder: no output for same position; single or counted
    /// horizontal moves on the same row (absolute column when the quirk
    /// allows and the target is in the first eight columns); the `H` short
    /// form for the origin; CNL/CPL for column 0 when line-relative codes
    /// work; CUU/CUD for same-column moves; CUP otherwise. Moves that leave
    /// the current row clear a sticky right edge first.
    pub fn move_cursor<W: Write>(&mut self, w: &mut W, x: u16, y: u16) -> io::Result<()> {
        let (cx, cy) = self.shadow.cursor();
        let (tx, ty) = (i32::from(x), i32::from(y));
        if (tx, ty) == (cx, cy) {
            return Ok(());
        }
        let known = cx >= 0 && cy >= 0;

        if known && ty == cy {
            let change = tx - cx;
            if self.quirks.contains(Quirks::ABS_COLUMN) && change.abs() != 1 && x < 8 {
                ansi::cha(w, x)?;
            } else if change > 0 {
                ansi::cuf(w, change as u16)?;
            } else {
                ansi::cub(w, change.unsigned_abs() as u16)?;
            }
        } else {
            // Leaving the row: a sticky edge must be cleared explicitly on
            // terminals with the wrapping quirk. Same-column moves need the
            // column preserved, so the left is undone by a right.
            if self.on_right_edge && self.quirks.contains(Quirks::WRAP_FIX) {
                ansi::cub(w, 1)?;
                if known && tx == cx {
                    ansi::cuf(w, 1)?;
                }
            }
            if (tx, ty) == (0, 0) {
                w.write_all(ansi::HOME)?;
            } else if known && tx == 0 && self.quirks.contains(Quirks::LINE_CODES) {
                let change = ty - cy;
                if change > 0 {
                    ansi::cnl(w, change as u16)?;
                } else {
                    ansi::cpl(w, change.unsigned_abs() as u16)?;
                }
            } else if known && tx == cx {
                let change = ty - cy;
                if change > 0 {
                    ansi::cud(w, change as u16)?;
                } else {
                    ansi::cuu(w, change.unsigned_abs() as u16)?;
                }
            } else {
                ansi::cup(w, x, y)?;
            }
        }

        self.on_right_edge = false;
        self.shadow.move_to(tx, ty);
        Ok(())
    }

    /// Emit one combined SGR taking the terminal from the shadow style to
    /// `(fg, bg, attrs)`, then record the new style in the shadow.
    ///
    /// Bright foregrounds force bold on. A bold-to-plain transition never
    /// emits the bold-off code; it asserts the faint-family reset instead,
    /// which clears both and is actually honored by terminals.
    pub fn set_style<W: Write>(
        &mut self,
        w: &mut W,
        fg: Color,
        bg: Color,
        attrs: Attrs,
    ) -> io::Result<()> {
        let mut params: SmallVec<[u8; 64]> = SmallVec::new();
        let mut target_attrs = attrs;
        let mut current_attrs = self.shadow.attrs();

        // Colors first, so a bright foreground can still force bold below.
        for (current, target, is_fg) in [
            (self.shadow.fg(), fg, true),
            (self.shadow.bg(), bg, false),
        ] {
            if current == target {
                continue;
            }
            if !params.is_empty() {
                params.push(b';');
            }
            if ansi::sgr_color(&mut params, target, is_fg, self.quirks)? {
                target_attrs |= Attrs::BOLD;
            }
        }

        if target_attrs != current_attrs {
            let mut diff = target_attrs ^ current_attrs;
            if diff.contains(Attrs::BOLD) && current_attrs.contains(Attrs::BOLD) {
                diff.remove(Attrs::BOLD);
                diff.insert(Attrs::FAINT);
                current_attrs.insert(Attrs::FAINT);
            }
            for attr in [
                Attrs::BOLD,
                Attrs::FAINT,
                Attrs::ITALIC,
                Attrs::UNDERLINE,
                Attrs::BLINK,
                Attrs::INVERSE,
                Attrs::INVISIBLE,
                Attrs::CROSSED,
            ] {
                if diff.contains(attr) {
                    if !params.is_empty() {
                        params.push(b';');
                    }
                    write!(
                        params,
                        "{}",
                        ansi::sgr_attr_code(attr, current_attrs.contains(attr))
                    )?;
                }
            }
        }

        if !params.is_empty() {
            w.write_all(b"\x1b[")?;
            w.write_all(&params)?;
            w.write_all(b"m")?;
        }

        self.shadow.set_fg(fg);
        self.shadow.set_bg(bg);
        self.shadow.set_attrs(target_attrs);
        Ok(())
    }

    /// Whether drawing `cell` requires a style change first.
    fn cell_style_differs(&self, cell: &Cell) -> bool {
        cell.fg != self.shadow.fg()
            || cell.bg != self.shadow.bg()
            || Self::effective_attrs(cell) != self.shadow.attrs()
    }

    /// A cell's attributes with the bright-foreground bold fold applied.
    fn effective_attrs(cell: &Cell) -> Attrs {
        let mut attrs = cell.attrs;
        if (9..COLOR_OFFSET_256).contains(&cell.fg.raw()) {
            attrs |= Attrs::BOLD;
        }
        attrs
    }

    /// Write a cell's glyph (blank cells print a space) and advance the
    /// model column, entering the sticky state at the right edge.
    fn emit_glyph<W: Write>(&mut self, w: &mut W, cell: &Cell) -> io::Result<()> {
        let cp = cell.codepoint();
        if cp.is_empty() {
            w.write_all(b" ")?;
        } else {
            w.write_all(cp)?;
        }

        let width = i32::from(self.shadow.width());
        let (mut x, mut y) = self.shadow.cursor();
        x += 1;
        if x >= width {
            if self.on_right_edge {
                // The deferred wrap committed: the glyph landed on the next
                // row and the cursor sits one past it.
                self.on_right_edge = false;
                x = 1;
                y += 1;
            } else {
                x = width - 1;
                self.on_right_edge = true;
            }
        }
        self.shadow.move_to(x, y);
        Ok(())
    }

    /// Reconcile the pending buffer against the shadow.
    ///
    /// Walks damaged cells in row-major order, emitting a move, a style
    /// change, and the glyph for each cell that actually differs. On
    /// success every previously damaged cell matches between shadow and
    /// pending, the damage map is clean, and — if requested — the terminal
    /// cursor rests at `cursor` (clipped to the grid). On a sink error the
    /// model and damage are rolled back so the flush can be retried.
    pub fn flush<W: Write>(
        &mut self,
        out: &mut W,
        pending: &Buffer,
        damage: &mut DamageMap,
        cursor: Option<(u16, u16)>,
    ) -> io::Result<()> {
        if !damage.has_damage() && cursor.is_none() {
            return Ok(());
        }

        let saved = self.snapshot();
        let mut buf = mem::take(&mut self.out_buf);
        buf.clear();
        self.synced.clear();

        let width = usize::from(self.shadow.width());
        if damage.has_damage() && width > 0 {
            let total = self.shadow.len().min(pending.len());
            let mut cursor_ofs = self.model_offset();
            let mut first = true;

            for i in 0..total {
                if !damage.is_marked_index(i) {
                    continue;
                }
                if self.shadow.cells()[i] == pending.cells()[i] {
                    continue;
                }

                if cursor_ofs != Some(i) {
                    self.move_cursor(&mut buf, (i % width) as u16, (i / width) as u16)?;
                } else if first && self.on_right_edge {
                    // Already positioned, but stuck on the edge from the
                    // previous flush: a no-op move commits the state.
                    if self.quirks.contains(Quirks::WRAP_FIX) {
                        ansi::cub(&mut buf, 1)?;
                    }
                    ansi::cuf(&mut buf, 1)?;
                    self.on_right_edge = false;
                }
                first = false;

                let cell = pending.cells()[i];
                if self.cell_style_differs(&cell) {
                    self.set_style(&mut buf, cell.fg, cell.bg, cell.attrs)?;
                }
                self.emit_glyph(&mut buf, &cell)?;
                self.synced.push(i);
                cursor_ofs = Some(i + 1);
            }
        }

        if let Some((x, y)) = cursor {
            let x = x.min(self.shadow.width().saturating_sub(1));
            let y = y.min(self.shadow.height().saturating_sub(1));
            self.move_cursor(&mut buf, x, y)?;
        }

        let result = out.write_all(&buf).and_then(|()| out.flush());
        match result {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(cells = self.synced.len(), bytes = buf.len(), "flush committed");
                for &i in &self.synced {
                    self.shadow.cells_mut()[i] = pending.cells()[i];
                }
                damage.clear();
                self.out_buf = buf;
                Ok(())
            }
            Err(err) => {
                self.restore(saved);
                self.out_buf = buf;
                Err(err)
            }
        }
    }

    /// Rewrite the entire grid, ignoring the damage map.
    ///
    /// Homes the cursor, then emits every cell in row-major order with
    /// style changes at each transition, relying on the terminal's
    /// autowrap. Used after a resize or a resume, when nothing about the
    /// physical screen can be trusted. Reading from the pending buffer
    /// synchronizes the shadow and clears damage on completion.
    pub fn full_redraw<W: Write>(
        &mut self,
        out: &mut W,
        source: RedrawSource<'_>,
        cursor: Option<(u16, u16)>,
    ) -> io::Result<()> {
        let saved = self.snapshot();
        let mut buf = mem::take(&mut self.out_buf);
        buf.clear();
        buf.extend_from_slice(ansi::HOME);
        self.on_right_edge = false;

        let total = self.shadow.len();
        for i in 0..total {
            let cell = match &source {
                RedrawSource::Pending { buffer, .. } => {
                    buffer.cells().get(i).copied().unwrap_or(Cell::BLANK)
                }
                RedrawSource::Shadow => self.shadow.cells()[i],
            };
            if self.cell_style_differs(&cell) {
                self.set_style(&mut buf, cell.fg, cell.bg, cell.attrs)?;
            }
            let cp = cell.codepoint();
            if cp.is_empty() {
                buf.extend_from_slice(b" ");
            } else {
                buf.extend_from_slice(cp);
            }
        }

        // The walk ends with a glyph in the bottom-right corner, which on a
        // deferring terminal leaves the cursor parked on the edge.
        let (w, h) = (self.shadow.width(), self.shadow.height());
        if w > 0 && h > 0 {
            self.shadow.move_to(i32::from(w) - 1, i32::from(h) - 1);
            self.on_right_edge = true;
        }

        if let Some((x, y)) = cursor {
            let x = x.min(w.saturating_sub(1));
            let y = y.min(h.saturating_sub(1));
            self.move_cursor(&mut buf, x, y)?;
        }

        let result = out.write_all(&buf).and_then(|()| out.flush());
        match result {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(bytes = buf.len(), "full redraw committed");
                if let RedrawSource::Pending { buffer, damage } = source {
                    let total = self.shadow.len().min(buffer.len());
                    self.shadow.cells_mut()[..total]
                        .copy_from_slice(&buffer.cells()[..total]);
                    damage.clear();
                }
                self.out_buf = buf;
                Ok(())
            }
            Err(err) => {
                self.restore(saved);
                self.out_buf = buf;
                Err(err)
            }
        }
    }

    /// Model cursor as a linear offset, when it is known and in-grid.
    fn model_offset(&self) -> Option<usize> {
        let (x, y) = self.shadow.cursor();
        let (w, h) = (i32::from(self.shadow.width()), i32::from(self.shadow.height()));
        if x >= 0 && y >= 0 && x < w && y < h {
            Some(y as usize * w as usize + x as usize)
        } else {
            None
        }
    }

    fn snapshot(&self) -> ModelState {
        ModelState {
            cursor: self.shadow.cursor(),
            fg: self.shadow.fg(),
            bg: self.shadow.bg(),
            attrs: self.shadow.attrs(),
            on_right_edge: self.on_right_edge,
        }
    }

    fn restore(&mut self, state: ModelState) {
        self.shadow.move_to(state.cursor.0, state.cursor.1);
        self.shadow.set_fg(state.fg);
        self.shadow.set_bg(state.bg);
        self.shadow.set_attrs(state.attrs);
        self.on_right_edge = state.on_right_edge;
    }
}

/// Rollback state for failed flushes.
struct ModelState {
    cursor: (i32, i32),
    fg: Color,
    bg: Color,
    attrs: Attrs,
    on_right_edge: bool,
}
