#![forbid(unsafe_code)]

//! Cell grid storage and blitting.
//!
//! A `Buffer` owns a `width x height` grid of [`Cell`]s in row-major order
//! plus a virtual cursor and the current drawing style. Rectangle operations
//! clip against both buffers' extents and honor a per-attribute copy mask.
//!
//! # Invariants
//!
//! 1. `cells.len() == width * height`
//! 2. The cursor is *not* clamped between operations; it may sit anywhere,
//!    including off-grid. Writes through an off-grid cursor are silently
//!    skipped (the cursor still advances).
//! 3. Every cell's codepoint bytes are NUL-padded past the encoded length;
//!    see [`crate::cell`].
//!
//! # Damage
//!
//! Each mutating operation has a `_tracked` twin taking the pending buffer's
//! [`DamageMap`]. A slot is marked only when the written value actually
//! changed the cell, so redrawing identical content stays flush-free. Plain
//! variants are for application-owned scratch buffers.

use bitflags::bitflags;

use crate::cell::{Attrs, Cell, Color, utf8_len};
use crate::damage::DamageMap;

/// Default tab stop for [`Buffer::print`].
pub const DEFAULT_TAB_STOP: u8 = 4;

bitflags! {
    /// Which cell components a blit or fill copies.
    ///
    /// An empty mask means "copy everything". `TRANSPARENT` only matters
    /// together with `CP`: source cells with no codepoint are skipped
    /// entirely, all components included.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DrawFlags: u8 {
        const CP = 1;
        const FG = 2;
        const BG = 4;
        const ATTR = 8;
        const TRANSPARENT = 16;
    }
}

impl DrawFlags {
    /// All components, no transparency.
    const COMPONENTS: Self = Self::CP.union(Self::FG).union(Self::BG).union(Self::ATTR);
}

/// A 2D grid of terminal cells with a drawing cursor and style.
#[derive(Debug, Clone)]
pub struct Buffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
    cursor: (i32, i32),
    fg: Color,
    bg: Color,
    attrs: Attrs,
    tab_stop: u8,
    unicode: bool,
}

impl Buffer {
    /// Create a zero-initialized buffer: blank cells, default colors,
    /// cursor at the origin.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::BLANK; width as usize * height as usize],
            cursor: (0, 0),
            fg: Color::DEFAULT,
            bg: Color::DEFAULT,
            attrs: Attrs::empty(),
            tab_stop: DEFAULT_TAB_STOP,
            unicode: true,
        }
    }

    /// Set whether codepoint writes decode multi-byte UTF-8 units.
    ///
    /// With Unicode off every byte counts as its own single-column unit.
    #[must_use]
    pub fn with_unicode(mut self, unicode: bool) -> Self {
        self.unicode = unicode;
        self
    }

    /// Buffer width in cells.
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Buffer height in cells.
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Total number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether multi-byte UTF-8 decoding is on.
    #[must_use]
    pub const fn unicode(&self) -> bool {
        self.unicode
    }

    /// The virtual cursor. May be off-grid.
    #[must_use]
    pub const fn cursor(&self) -> (i32, i32) {
        self.cursor
    }

    /// Position the cursor. No clamping happens here; off-grid writes are
    /// clipped at write time.
    pub fn move_to(&mut self, x: i32, y: i32) {
        self.cursor = (x, y);
    }

    /// Current foreground drawing color.
    #[must_use]
    pub const fn fg(&self) -> Color {
        self.fg
    }

    /// Current background drawing color.
    #[must_use]
    pub const fn bg(&self) -> Color {
        self.bg
    }

    /// Current drawing attributes.
    #[must_use]
    pub const fn attrs(&self) -> Attrs {
        self.attrs
    }

    /// Set the foreground drawing color.
    pub fn set_fg(&mut self, fg: Color) {
        self.fg = fg;
    }

    /// Set the background drawing color.
    pub fn set_bg(&mut self, bg: Color) {
        self.bg = bg;
    }

    /// Set the drawing attributes.
    pub fn set_attrs(&mut self, attrs: Attrs) {
        self.attrs = attrs;
    }

    /// Current tab stop width.
    #[must_use]
    pub const fn tab_stop(&self) -> u8 {
        self.tab_stop
    }

    /// Set the tab stop width; `0` restores the default.
    pub fn set_tab_stop(&mut self, tab_stop: u8) {
        self.tab_stop = if tab_stop == 0 {
            DEFAULT_TAB_STOP
        } else {
            tab_stop
        };
    }

    /// All cells, row-major.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// Linear index for in-grid coordinates.
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x >= 0 && y >= 0 && x < i32::from(self.width) && y < i32::from(self.height) {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// The cell at `(x, y)`, if in-grid.
    #[must_use]
    pub fn cell(&self, x: i32, y: i32) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    /// Store a whole cell at `(x, y)`. Off-grid writes are ignored.
    pub fn put_cell(&mut self, x: i32, y: i32, cell: Cell) {
        self.put_cell_tracked(x, y, cell, None);
    }

    /// [`Self::put_cell`] with damage tracking.
    pub fn put_cell_tracked(
        &mut self,
        x: i32,
        y: i32,
        cell: Cell,
        damage: Option<&mut DamageMap>,
    ) {
        if let Some(i) = self.index(x, y)
            && self.cells[i] != cell
        {
            self.cells[i] = cell;
            if let Some(dm) = damage {
                dm.mark_index(i);
            }
        }
    }

    /// Write one codepoint at the cursor in the current style, then advance.
    ///
    /// Returns the number of input bytes consumed. The write is skipped —
    /// but the cursor still advances — when the target is off-grid or the
    /// byte is a lone ASCII control character.
    pub fn put(&mut self, cp: &str) -> usize {
        self.put_bytes_tracked(cp.as_bytes(), None)
    }

    /// [`Self::put`] with damage tracking.
    pub fn put_tracked(&mut self, cp: &str, damage: Option<&mut DamageMap>) -> usize {
        self.put_bytes_tracked(cp.as_bytes(), damage)
    }

    pub(crate) fn put_bytes_tracked(
        &mut self,
        bytes: &[u8],
        damage: Option<&mut DamageMap>,
    ) -> usize {
        let Some(&first) = bytes.first() else {
            return 0;
        };
        let len = utf8_len(first, self.unicode).min(bytes.len());
        let control = len == 1 && (first < 0x20 || first == 0x7F);

        if !control
            && let Some(i) = self.index(self.cursor.0, self.cursor.1)
        {
            let mut cell = Cell {
                cp: [0; 4],
                fg: self.fg,
                bg: self.bg,
                attrs: self.attrs,
            };
            cell.set_codepoint(&bytes[..len], self.unicode);
            if self.cells[i] != cell {
                self.cells[i] = cell;
                if let Some(dm) = damage {
                    dm.mark_index(i);
                }
            }
        }

        self.cursor.0 += 1;
        if self.cursor.0 >= i32::from(self.width) {
            self.cursor.0 = 0;
            self.cursor.1 += 1;
        }
        len
    }

    /// Print a string at the cursor, dispatching control bytes.
    ///
    /// NUL terminates early; `\n` advances the row and resets the column;
    /// `\r` resets the column; `\f` and `\v` advance the row only; `\b`
    /// steps left (clamped at column 0); `\t` advances to the next tab
    /// stop. Everything else goes through [`Self::put`]. Returns the number
    /// of bytes consumed.
    pub fn print(&mut self, s: &str) -> usize {
        self.print_tracked(s, None)
    }

    /// [`Self::print`] with damage tracking.
    pub fn print_tracked(&mut self, s: &str, mut damage: Option<&mut DamageMap>) -> usize {
        let bytes = s.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let step = match bytes[i] {
                0 => return i + 1,
                b'\n' => {
                    self.cursor.1 += 1;
                    self.cursor.0 = 0;
                    1
                }
                b'\r' => {
                    self.cursor.0 = 0;
                    1
                }
                0x0B | 0x0C => {
                    self.cursor.1 += 1;
                    1
                }
                0x08 => {
                    if self.cursor.0 > 0 {
                        self.cursor.0 -= 1;
                    }
                    1
                }
                b'\t' => {
                    let ts = i32::from(self.tab_stop);
                    self.cursor.0 += ts - self.cursor.0.rem_euclid(ts);
                    1
                }
                _ => self.put_bytes_tracked(&bytes[i..], damage.as_deref_mut()),
            };
            i += step;
        }
        i
    }

    /// Copy a rectangle from `src`, clipped to both grids.
    ///
    /// A negative source origin makes the call a no-op; a negative
    /// destination origin shifts the source origin and shrinks the
    /// rectangle accordingly.
    #[allow(clippy::too_many_arguments)]
    pub fn blit_from(
        &mut self,
        src: &Buffer,
        sx: i32,
        sy: i32,
        dx: i32,
        dy: i32,
        w: i32,
        h: i32,
        flags: DrawFlags,
    ) {
        self.blit_from_tracked(src, sx, sy, dx, dy, w, h, flags, None);
    }

    /// [`Self::blit_from`] with damage tracking.
    #[allow(clippy::too_many_arguments)]
    pub fn blit_from_tracked(
        &mut self,
        src: &Buffer,
        mut sx: i32,
        mut sy: i32,
        mut dx: i32,
        mut dy: i32,
        mut w: i32,
        mut h: i32,
        flags: DrawFlags,
        mut damage: Option<&mut DamageMap>,
    ) {
        if sx < 0 || sy < 0 {
            return;
        }
        if dx < 0 {
            sx -= dx;
            w += dx;
            dx = 0;
        }
        if dy < 0 {
            sy -= dy;
            h += dy;
            dy = 0;
        }
        if sx >= i32::from(src.width) || sy >= i32::from(src.height) {
            return;
        }
        w = w
            .min(i32::from(src.width) - sx)
            .min(i32::from(self.width) - dx);
        h = h
            .min(i32::from(src.height) - sy)
            .min(i32::from(self.height) - dy);
        if w <= 0 || h <= 0 {
            return;
        }

        let flags = if flags.is_empty() {
            DrawFlags::COMPONENTS
        } else {
            flags
        };
        let transparent = flags.contains(DrawFlags::CP | DrawFlags::TRANSPARENT);

        for row in 0..h as usize {
            let src_row = (sy as usize + row) * src.width as usize + sx as usize;
            let dst_row = (dy as usize + row) * self.width as usize + dx as usize;
            for col in 0..w as usize {
                let s = src.cells[src_row + col];
                if transparent && s.is_blank() {
                    continue;
                }
                let di = dst_row + col;
                let mut merged = self.cells[di];
                if flags.contains(DrawFlags::CP) {
                    merged.cp = s.cp;
                }
                if flags.contains(DrawFlags::FG) {
                    merged.fg = s.fg;
                }
                if flags.contains(DrawFlags::BG) {
                    merged.bg = s.bg;
                }
                if flags.contains(DrawFlags::ATTR) {
                    merged.attrs = s.attrs;
                }
                if merged != self.cells[di] {
                    self.cells[di] = merged;
                    if let Some(dm) = damage.as_deref_mut() {
                        dm.mark_index(di);
                    }
                }
            }
        }
    }

    /// Broadcast one cell over a rectangle, clipped to the grid.
    ///
    /// The component mask works as for blits; `TRANSPARENT` has no effect
    /// on fills.
    pub fn fill(&mut self, dx: i32, dy: i32, w: i32, h: i32, cell: &Cell, flags: DrawFlags) {
        self.fill_tracked(dx, dy, w, h, cell, flags, None);
    }

    /// [`Self::fill`] with damage tracking.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_tracked(
        &mut self,
        mut dx: i32,
        mut dy: i32,
        mut w: i32,
        mut h: i32,
        cell: &Cell,
        flags: DrawFlags,
        mut damage: Option<&mut DamageMap>,
    ) {
        if dx < 0 {
            w += dx;
            dx = 0;
        }
        if dy < 0 {
            h += dy;
            dy = 0;
        }
        w = w.min(i32::from(self.width) - dx);
        h = h.min(i32::from(self.height) - dy);
        if w <= 0 || h <= 0 {
            return;
        }

        let flags = if flags.is_empty() {
            DrawFlags::COMPONENTS
        } else {
            flags
        };

        for row in 0..h as usize {
            let dst_row = (dy as usize + row) * self.width as usize + dx as usize;
            for col in 0..w as usize {
                let di = dst_row + col;
                let mut merged = self.cells[di];
                if flags.contains(DrawFlags::CP) {
                    merged.cp = cell.cp;
                }
                if flags.contains(DrawFlags::FG) {
                    merged.fg = cell.fg;
                }
                if flags.contains(DrawFlags::BG) {
                    merged.bg = cell.bg;
                }
                if flags.contains(DrawFlags::ATTR) {
                    merged.attrs = cell.attrs;
                }
                if merged != self.cells[di] {
                    self.cells[di] = merged;
                    if let Some(dm) = damage.as_deref_mut() {
                        dm.mark_index(di);
                    }
                }
            }
        }
    }

    /// Re-fit the grid to new dimensions.
    ///
    /// With an unchanged width the cell vector grows or shrinks in place,
    /// zeroing any appended tail. Otherwise a fresh grid is built and the
    /// top-left intersection blitted across. Cursor, style, and tab stop
    /// carry over either way.
    pub fn resize(&mut self, width: u16, height: u16) {
        if width == self.width {
            self.cells
                .resize(width as usize * height as usize, Cell::BLANK);
            self.height = height;
        } else {
            let mut next = Buffer::new(width, height).with_unicode(self.unicode);
            next.blit_from(
                self,
                0,
                0,
                0,
                0,
                i32::from(self.width.min(width)),
                i32::from(self.height.min(height)),
                DrawFlags::empty(),
            );
            next.cursor = self.cursor;
            next.fg = self.fg;
            next.bg = self.bg;
            next.attrs = self.attrs;
            next.tab_stop = self.tab_stop;
            *self = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styled(cp: &str, fg: u32) -> Cell {
        Cell::new(cp, Color::from_raw(fg), Color::DEFAULT, Attrs::empty())
    }

    #[test]
    fn put_writes_and_advances() {
        let mut buf = Buffer::new(3, 2);
        buf.set_fg(Color::ansi(2));
        assert_eq!(buf.put("a"), 1);
        assert_eq!(buf.cursor(), (1, 0));
        let cell = buf.cell(0, 0).unwrap();
        assert_eq!(cell.codepoint(), b"a");
        assert_eq!(cell.fg, Color::ansi(2));
    }

    #[test]
    fn put_wraps_at_right_edge() {
        let mut buf = Buffer::new(3, 2);
        buf.move_to(2, 0);
        buf.put("x");
        assert_eq!(buf.cursor(), (0, 1));
    }

    #[test]
    fn off_grid_put_skips_but_advances() {
        let mut buf = Buffer::new(3, 2);
        buf.move_to(-2, 0);
        buf.put("x");
        assert_eq!(buf.cursor(), (-1, 0));
        assert!(buf.cells().iter().all(Cell::is_blank));

        buf.move_to(0, 5);
        buf.put("x");
        assert_eq!(buf.cursor(), (1, 5));
        assert!(buf.cells().iter().all(Cell::is_blank));
    }

    #[test]
    fn control_bytes_skip_the_write() {
        let mut buf = Buffer::new(3, 1);
        buf.put("\u{1}");
        assert!(buf.cell(0, 0).unwrap().is_blank());
        assert_eq!(buf.cursor(), (1, 0));
    }

    #[test]
    fn put_consumes_whole_utf8_unit() {
        let mut buf = Buffer::new(3, 1);
        assert_eq!(buf.put("ü"), 2);
        assert_eq!(buf.cell(0, 0).unwrap().codepoint(), "ü".as_bytes());
        assert_eq!(buf.cursor(), (1, 0));
    }

    #[test]
    fn unicode_off_writes_single_bytes() {
        let mut buf = Buffer::new(4, 1).with_unicode(false);
        assert_eq!(buf.put("ü"), 1);
        assert_eq!(buf.cell(0, 0).unwrap().cp, [0xC3, 0, 0, 0]);
    }

    #[test]
    fn utf8_overwrite_leaves_no_stale_bytes() {
        let mut buf = Buffer::new(3, 1);
        buf.put("ü");
        buf.move_to(0, 0);
        buf.put("a");
        assert_eq!(&buf.cell(0, 0).unwrap().cp, b"a\0\0\0");
    }

    #[test]
    fn print_dispatches_controls() {
        let mut buf = Buffer::new(8, 4);
        buf.print("ab\ncd");
        assert_eq!(buf.cell(0, 0).unwrap().codepoint(), b"a");
        assert_eq!(buf.cell(1, 0).unwrap().codepoint(), b"b");
        assert_eq!(buf.cell(0, 1).unwrap().codepoint(), b"c");
        assert_eq!(buf.cell(1, 1).unwrap().codepoint(), b"d");
        assert_eq!(buf.cursor(), (2, 1));
    }

    #[test]
    fn print_carriage_return_and_backspace() {
        let mut buf = Buffer::new(8, 2);
        buf.print("abc\rx");
        assert_eq!(buf.cell(0, 0).unwrap().codepoint(), b"x");

        buf.move_to(0, 1);
        buf.print("\u{8}");
        assert_eq!(buf.cursor(), (0, 1));
        buf.move_to(3, 1);
        buf.print("\u{8}");
        assert_eq!(buf.cursor(), (2, 1));
    }

    #[test]
    fn print_vertical_controls_keep_column() {
        let mut buf = Buffer::new(8, 4);
        buf.move_to(3, 0);
        buf.print("\u{b}");
        assert_eq!(buf.cursor(), (3, 1));
        buf.print("\u{c}");
        assert_eq!(buf.cursor(), (3, 2));
    }

    #[test]
    fn print_tab_advances_to_stop() {
        let mut buf = Buffer::new(16, 1);
        buf.print("\t");
        assert_eq!(buf.cursor(), (4, 0));
        buf.move_to(5, 0);
        buf.print("\t");
        assert_eq!(buf.cursor(), (8, 0));

        buf.set_tab_stop(8);
        buf.move_to(3, 0);
        buf.print("\t");
        assert_eq!(buf.cursor(), (8, 0));
    }

    #[test]
    fn print_stops_at_nul() {
        let mut buf = Buffer::new(8, 1);
        let consumed = buf.print("ab\0cd");
        assert_eq!(consumed, 3);
        assert!(buf.cell(2, 0).unwrap().is_blank());
    }

    #[test]
    fn degenerate_blits_change_nothing() {
        let src = {
            let mut b = Buffer::new(4, 4);
            b.print("full");
            b
        };
        let pristine = Buffer::new(4, 4);

        for (sx, sy, dx, dy, w, h) in [
            (0, 0, 0, 0, 0, 4),   // zero width
            (0, 0, 0, 0, 4, 0),   // zero height
            (-1, 0, 0, 0, 2, 2),  // negative source
            (0, -3, 0, 0, 2, 2),
            (0, 0, 9, 0, 2, 2),   // fully off destination
            (0, 0, 0, -9, 2, 2),
            (5, 0, 0, 0, 2, 2),   // source origin past extent
        ] {
            let mut dst = Buffer::new(4, 4);
            dst.blit_from(&src, sx, sy, dx, dy, w, h, DrawFlags::empty());
            assert_eq!(
                dst.cells(),
                pristine.cells(),
                "blit ({sx},{sy})->({dx},{dy}) {w}x{h} should be a no-op"
            );
        }
    }

    #[test]
    fn blit_clips_negative_destination() {
        let mut src = Buffer::new(3, 3);
        for y in 0..3 {
            for x in 0..3 {
                src.put_cell(x, y, styled("s", (y * 3 + x + 1) as u32));
            }
        }
        let mut dst = Buffer::new(3, 3);
        // Destination shifted up-left by one: source advances, rect shrinks.
        dst.blit_from(&src, 0, 0, -1, -1, 3, 3, DrawFlags::empty());
        assert_eq!(dst.cell(0, 0).unwrap().fg, Color::from_raw(5));
        assert_eq!(dst.cell(1, 1).unwrap().fg, Color::from_raw(9));
        assert!(dst.cell(2, 2).unwrap().is_blank());
    }

    #[test]
    fn blit_clips_to_destination_extent() {
        let mut src = Buffer::new(4, 4);
        src.fill(0, 0, 4, 4, &styled("x", 3), DrawFlags::empty());
        let mut dst = Buffer::new(3, 3);
        dst.blit_from(&src, 0, 0, 2, 2, 4, 4, DrawFlags::empty());
        assert!(!dst.cell(2, 2).unwrap().is_blank());
        assert!(dst.cell(1, 1).unwrap().is_blank());
    }

    #[test]
    fn blit_mask_copies_selected_components() {
        let mut src = Buffer::new(1, 1);
        src.put_cell(
            0,
            0,
            Cell::new("s", Color::ansi(1), Color::ansi(2), Attrs::BOLD),
        );
        let mut dst = Buffer::new(1, 1);
        dst.put_cell(
            0,
            0,
            Cell::new("d", Color::ansi(3), Color::ansi(4), Attrs::ITALIC),
        );

        dst.blit_from(&src, 0, 0, 0, 0, 1, 1, DrawFlags::FG | DrawFlags::ATTR);
        let cell = dst.cell(0, 0).unwrap();
        assert_eq!(cell.codepoint(), b"d");
        assert_eq!(cell.fg, Color::ansi(1));
        assert_eq!(cell.bg, Color::ansi(4));
        assert_eq!(cell.attrs, Attrs::BOLD);
    }

    #[test]
    fn transparent_blit_skips_blank_sources_entirely() {
        let mut src = Buffer::new(2, 1);
        src.put_cell(0, 0, Cell::new("s", Color::ansi(1), Color::ansi(2), Attrs::BOLD));
        // src cell (1,0) stays blank but carries a loud style.
        src.put_cell(
            1,
            0,
            Cell {
                cp: [0; 4],
                fg: Color::ansi(5),
                bg: Color::ansi(6),
                attrs: Attrs::BLINK,
            },
        );
        let mut dst = Buffer::new(2, 1);
        dst.put_cell(1, 0, styled("d", 9));

        dst.blit_from(
            &src,
            0,
            0,
            0,
            0,
            2,
            1,
            DrawFlags::COMPONENTS | DrawFlags::TRANSPARENT,
        );
        assert_eq!(dst.cell(0, 0).unwrap().codepoint(), b"s");
        // Blank source cell left the destination untouched, style included.
        let kept = dst.cell(1, 0).unwrap();
        assert_eq!(kept.codepoint(), b"d");
        assert_eq!(kept.fg, Color::from_raw(9));
    }

    #[test]
    fn damage_marks_exactly_changed_cells() {
        let mut src = Buffer::new(4, 1);
        src.print("xxxx");
        let mut dst = Buffer::new(4, 1);
        dst.print("x");
        dst.move_to(0, 0);
        let mut damage = DamageMap::new(4, 1);

        dst.blit_from_tracked(&src, 0, 0, 0, 0, 4, 1, DrawFlags::empty(), Some(&mut damage));
        // Cell 0 already held "x": no damage there.
        assert!(!damage.is_marked(0, 0));
        assert!(damage.is_marked(1, 0));
        assert!(damage.is_marked(2, 0));
        assert!(damage.is_marked(3, 0));
        assert!(damage.has_damage());
    }

    #[test]
    fn rewriting_identical_content_sets_no_damage() {
        let mut buf = Buffer::new(3, 1);
        let mut damage = DamageMap::new(3, 1);
        buf.print_tracked("abc", Some(&mut damage));
        assert!(damage.has_damage());

        damage.clear();
        buf.move_to(0, 0);
        buf.print_tracked("abc", Some(&mut damage));
        assert!(!damage.has_damage());
    }

    #[test]
    fn fill_broadcasts_and_clips() {
        let mut buf = Buffer::new(4, 4);
        buf.fill(-1, -1, 3, 3, &styled("f", 2), DrawFlags::empty());
        assert!(!buf.cell(0, 0).unwrap().is_blank());
        assert!(!buf.cell(1, 1).unwrap().is_blank());
        assert!(buf.cell(2, 2).unwrap().is_blank());

        let mut clean = Buffer::new(4, 4);
        clean.fill(0, 0, 0, 9, &styled("f", 2), DrawFlags::empty());
        assert!(clean.cells().iter().all(Cell::is_blank));
    }

    #[test]
    fn resize_same_width_extends_with_blanks() {
        let mut buf = Buffer::new(3, 2);
        buf.print("abcdef");
        buf.resize(3, 4);
        assert_eq!(buf.width(), 3);
        assert_eq!(buf.height(), 4);
        assert_eq!(buf.cell(0, 0).unwrap().codepoint(), b"a");
        assert_eq!(buf.cell(2, 1).unwrap().codepoint(), b"f");
        assert!(buf.cell(0, 2).unwrap().is_blank());
        assert!(buf.cell(2, 3).unwrap().is_blank());
    }

    #[test]
    fn resize_shrink_keeps_head() {
        let mut buf = Buffer::new(3, 3);
        buf.print("abcdefghi");
        buf.resize(3, 1);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.cell(2, 0).unwrap().codepoint(), b"c");
    }

    #[test]
    fn resize_new_width_preserves_intersection() {
        let mut buf = Buffer::new(4, 3);
        buf.set_fg(Color::ansi(5));
        buf.print("abcdefghijkl");
        buf.move_to(9, 9);
        buf.resize(2, 2);

        assert_eq!(buf.cell(0, 0).unwrap().codepoint(), b"a");
        assert_eq!(buf.cell(1, 0).unwrap().codepoint(), b"b");
        assert_eq!(buf.cell(0, 1).unwrap().codepoint(), b"e");
        assert_eq!(buf.cell(1, 1).unwrap().codepoint(), b"f");
        // Cursor and style transfer as-is.
        assert_eq!(buf.cursor(), (9, 9));
        assert_eq!(buf.fg(), Color::ansi(5));

        buf.resize(5, 3);
        assert_eq!(buf.cell(1, 1).unwrap().codepoint(), b"f");
        assert!(buf.cell(4, 2).unwrap().is_blank());
    }

    proptest::proptest! {
        #[test]
        fn blit_never_panics_and_degenerates_cleanly(
            sx in -8i32..8, sy in -8i32..8,
            dx in -8i32..8, dy in -8i32..8,
            w in -8i32..8, h in -8i32..8,
        ) {
            let mut src = Buffer::new(4, 3);
            src.print("somesourcete");
            let mut dst = Buffer::new(3, 4);
            dst.blit_from(&src, sx, sy, dx, dy, w, h, DrawFlags::empty());
        }

        #[test]
        fn fill_never_panics(
            dx in -8i32..8, dy in -8i32..8,
            w in -8i32..8, h in -8i32..8,
        ) {
            let mut dst = Buffer::new(3, 3);
            dst.fill(dx, dy, w, h, &Cell::BLANK, DrawFlags::empty());
        }
    }
}
