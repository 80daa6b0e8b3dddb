//! The owning terminal object: staged lifecycle, event loop, and modes.
//!
//! `Terminal` ties the crates together: it loads the capability store, runs
//! the startup probes, owns the pending buffer + damage map + presenter,
//! and drives the event loop over the tty and the self-pipe.
//!
//! # Lifecycle
//!
//! Init is staged; a failure at any stage unwinds everything the earlier
//! stages acquired:
//!
//! 0. capability store, `SIGWINCH` flag, terminal size (and minimum check)
//! 1. tty state capture, self-pipe, non-blocking + raw mode, quirk probe
//! 2. Unicode/color detection, stale-mouse reset, key table,
//!    keypad-transmit, `SIGCONT` flag
//! 3. buffers + damage + output sink, alternate screen, runtime flags
//!    forced through all-off
//!
//! Teardown (explicit [`Terminal::close`] or `Drop`) mirrors the stages in
//! reverse and is idempotent.
//!
//! # Concurrency
//!
//! Single-threaded by contract; the only cross-thread entry point is the
//! [`Waker`] returned by [`Terminal::waker`], which injects bytes through
//! the self-pipe. Signal handlers only set atomic flags
//! (`signal-hook`'s flag registry); the event loop reads and clears them at
//! its next wakeup, so no work happens in signal context.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bitflags::bitflags;
use signal_hook::SigId;
use signal_hook::consts::signal::{SIGCONT, SIGWINCH};
use signal_hook::flag as signal_flag;
use signal_hook::low_level::unregister;

use hexes_core::event::{KeyCode, KeyEvent, Modifiers, MouseEvent};
use hexes_core::keys::{self, KeyTable};
use hexes_core::mouse::{self, MouseMode};
use hexes_core::probe::{self, ProbeIo, Quirks};
use hexes_core::terminfo::{Database, SearchPath, cap};
use hexes_render::ansi;
use hexes_render::buffer::{Buffer, DrawFlags};
use hexes_render::cell::{Attrs, Cell, Color, utf8_len};
use hexes_render::damage::DamageMap;
use hexes_render::presenter::{Presenter, RedrawSource};

use crate::unix::{self, Tty, Waker};
use crate::{Error, Result};

bitflags! {
    /// Options for the startup probes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InitFlags: u8 {
        /// Do not probe for Unicode; the answer is taken from
        /// [`InitFlags::FORCE_UNICODE`].
        const SKIP_UNICODE_PROBE = 1;
        /// Do not probe for color support; the color count stays unknown.
        const SKIP_COLOR_PROBE = 2;
        /// Fail init when the probe says Unicode is unsupported.
        const REQUIRE_UNICODE = 4;
        /// With the probe skipped, declare Unicode supported.
        const FORCE_UNICODE = 8;
    }
}

bitflags! {
    /// Runtime display and reporting toggles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RuntimeFlags: u8 {
        /// Hide the cursor.
        const HIDE_CURSOR = 1;
        /// Reverse-video the whole screen.
        const REVERSE_VIDEO = 2;
        /// Very-visible cursor, where the terminal has one.
        const BRIGHT_CURSOR = 4;
        /// Report focus-in/focus-out events.
        const FOCUS_EVENTS = 8;
    }
}

/// Init configuration.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Fail with [`Error::TooSmall`] when the terminal is narrower. 0
    /// disables the check.
    pub min_width: u16,
    /// Fail with [`Error::TooSmall`] when the terminal is shorter. 0
    /// disables the check.
    pub min_height: u16,
    /// Probe behavior.
    pub flags: InitFlags,
}

/// The terminal runtime.
///
/// # Contract
///
/// Exclusive ownership of the process's controlling terminal is assumed;
/// create one `Terminal` at a time. All methods are single-threaded except
/// [`Terminal::waker`]'s handle.
pub struct Terminal {
    db: Database,
    tty: Tty,
    pending: Buffer,
    damage: DamageMap,
    presenter: Presenter,
    key_table: KeyTable,
    flags: RuntimeFlags,
    mouse_mode: MouseMode,
    stash: Vec<u8>,
    unicode: bool,
    colors: u32,
    resize_flag: Arc<AtomicBool>,
    cont_flag: Arc<AtomicBool>,
    winch_id: Option<SigId>,
    cont_id: Option<SigId>,
    closed: bool,
}

/// Probe transport over the raw tty and stdout.
struct ProbeChannel<'a> {
    tty: &'a mut Tty,
}

impl ProbeIo for ProbeChannel<'_> {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()
    }

    fn recv_byte(&mut self, timeout_ms: i32) -> io::Result<Option<u8>> {
        loop {
            if let Some(byte) = self.tty.next_byte()? {
                return Ok(Some(byte));
            }
            if self.tty.wait(timeout_ms)? == 0 {
                return Ok(None);
            }
        }
    }
}

impl Terminal {
    /// Initialize the terminal runtime.
    ///
    /// See the module docs for the stages. On error everything acquired so
    /// far is released and the terminal is back in its original mode.
    pub fn new(options: InitOptions) -> Result<Self> {
        // Stage 0: capability store and the resize flag.
        let term_env = std::env::var("TERM").ok();
        let search = SearchPath::from_env(unix::passwd_home());
        let db = term_env
            .as_deref()
            .and_then(|term| Database::load(term, &search))
            .unwrap_or_else(|| {
                tracing::warn!(term = term_env.as_deref(), "no terminfo entry, using defaults");
                Database::empty()
            });

        let resize_flag = Arc::new(AtomicBool::new(false));
        let winch_id =
            signal_flag::register(SIGWINCH, Arc::clone(&resize_flag)).map_err(Error::Signal)?;

        let size = unix::window_size().or_else(|| db_size(&db));
        let Some((width, height)) = size else {
            unregister(winch_id);
            return Err(Error::Size);
        };
        if (options.min_width > 0 && width < options.min_width)
            || (options.min_height > 0 && height < options.min_height)
        {
            unregister(winch_id);
            return Err(Error::TooSmall { width, height });
        }

        // Stage 1: raw input and the quirk probe.
        let mut tty = match Tty::open() {
            Ok(tty) => tty,
            Err(err) => {
                unregister(winch_id);
                return Err(Error::Input(err));
            }
        };
        let quirks = {
            let mut channel = ProbeChannel { tty: &mut tty };
            probe::detect_quirks(&mut channel, term_env.as_deref(), width, height)
        };
        tracing::debug!(?quirks, width, height, "terminal probed");

        // Stage 2: Unicode and color detection, then the continue flag.
        let stage2_unwind = |tty: &mut Tty| {
            tty.restore();
            unregister(winch_id);
        };

        let unicode = if options.flags.contains(InitFlags::SKIP_UNICODE_PROBE) {
            options.flags.contains(InitFlags::FORCE_UNICODE)
        } else {
            let mut channel = ProbeChannel { tty: &mut tty };
            match probe::detect_unicode(&mut channel, quirks, width) {
                Ok(Some(true)) => true,
                Ok(Some(false)) => {
                    if options.flags.contains(InitFlags::REQUIRE_UNICODE) {
                        stage2_unwind(&mut tty);
                        return Err(Error::Unicode);
                    }
                    false
                }
                Ok(None) | Err(_) => {
                    stage2_unwind(&mut tty);
                    return Err(Error::Unicode);
                }
            }
        };

        let colors = if options.flags.contains(InitFlags::SKIP_COLOR_PROBE) {
            0
        } else {
            let colorterm = std::env::var("COLORTERM").ok();
            let mut channel = ProbeChannel { tty: &mut tty };
            probe::detect_colors(&mut channel, &db, colorterm.as_deref()).unwrap_or(0)
        };

        let cont_flag = Arc::new(AtomicBool::new(false));
        let cont_id = match signal_flag::register(SIGCONT, Arc::clone(&cont_flag)) {
            Ok(id) => id,
            Err(err) => {
                stage2_unwind(&mut tty);
                return Err(Error::Signal(err));
            }
        };

        // Stage 3: buffers and screen setup. From here teardown runs
        // through Drop, so errors unwind by returning.
        let mut terminal = Self {
            key_table: KeyTable::from_database(&db),
            db,
            tty,
            pending: Buffer::new(width, height).with_unicode(unicode),
            damage: DamageMap::new(width, height),
            presenter: Presenter::new(width, height, quirks),
            flags: RuntimeFlags::empty(),
            mouse_mode: MouseMode::Off,
            stash: Vec::with_capacity(keys::MAX_SEQUENCE),
            unicode,
            colors,
            resize_flag,
            cont_flag,
            winch_id: Some(winch_id),
            cont_id: Some(cont_id),
            closed: false,
        };
        terminal.enter_screen()?;
        tracing::info!(width, height, unicode, colors, "terminal ready");
        Ok(terminal)
    }

    /// Stage 2/3 output: stale-mouse reset, keypad-transmit, alternate
    /// screen, and the all-off flag transition.
    fn enter_screen(&mut self) -> Result<()> {
        // Enabling and disabling a protocol clears whatever mouse state a
        // previous occupant left behind.
        self.set_mouse(MouseMode::Press)?;
        self.set_mouse(MouseMode::Off)?;

        {
            let mut out = io::stdout().lock();
            if let Some(smkx) = self.db.string(cap::STR_KEYPAD_XMIT) {
                out.write_all(smkx).map_err(Error::Io)?;
            }
            match self.db.string(cap::STR_ENTER_CA_MODE) {
                Some(smcup) => {
                    out.write_all(smcup).map_err(Error::Io)?;
                    out.write_all(ansi::HOME).map_err(Error::Io)?;
                }
                None => out.write_all(ansi::HARD_RESET).map_err(Error::Io)?,
            }
            out.flush().map_err(Error::Io)?;
        }

        self.flags = RuntimeFlags::all();
        self.change_flags(Some(RuntimeFlags::empty()))?;
        Ok(())
    }

    /// Grid width in cells.
    #[must_use]
    pub fn width(&self) -> u16 {
        self.pending.width()
    }

    /// Grid height in cells.
    #[must_use]
    pub fn height(&self) -> u16 {
        self.pending.height()
    }

    /// Whether the terminal was found (or declared) Unicode-capable.
    #[must_use]
    pub const fn unicode(&self) -> bool {
        self.unicode
    }

    /// Detected color count in the cell-color integer scale; 0 when
    /// unknown.
    #[must_use]
    pub const fn colors(&self) -> u32 {
        self.colors
    }

    /// The quirks the probe detected.
    #[must_use]
    pub const fn quirks(&self) -> Quirks {
        self.presenter.quirks()
    }

    /// The pending buffer, read-only. Useful as a blit source.
    #[must_use]
    pub fn buffer(&self) -> &Buffer {
        &self.pending
    }

    /// An off-screen buffer matching this terminal's Unicode mode.
    #[must_use]
    pub fn new_buffer(&self, width: u16, height: u16) -> Buffer {
        Buffer::new(width, height).with_unicode(self.unicode)
    }

    /// A cross-thread handle that injects input bytes; see [`Waker`].
    #[must_use]
    pub fn waker(&self) -> Waker {
        self.tty.waker()
    }

    // --- Drawing into the pending buffer -----------------------------------

    /// Position the drawing cursor.
    pub fn locate(&mut self, x: i32, y: i32) {
        self.pending.move_to(x, y);
    }

    /// Set the foreground drawing color.
    pub fn set_fg(&mut self, fg: Color) {
        self.pending.set_fg(fg);
    }

    /// Set the background drawing color.
    pub fn set_bg(&mut self, bg: Color) {
        self.pending.set_bg(bg);
    }

    /// Set the drawing attributes.
    pub fn set_attrs(&mut self, attrs: Attrs) {
        self.pending.set_attrs(attrs);
    }

    /// Set the tab stop width; `0` restores the default.
    pub fn set_tab_stop(&mut self, tab_stop: u8) {
        self.pending.set_tab_stop(tab_stop);
    }

    /// Write one codepoint at the cursor; returns bytes consumed.
    pub fn put(&mut self, cp: &str) -> usize {
        self.pending.put_tracked(cp, Some(&mut self.damage))
    }

    /// Print a string at the cursor with control-byte dispatch.
    pub fn print(&mut self, s: &str) -> usize {
        self.pending.print_tracked(s, Some(&mut self.damage))
    }

    /// Store a whole cell.
    pub fn put_cell(&mut self, x: i32, y: i32, cell: Cell) {
        self.pending
            .put_cell_tracked(x, y, cell, Some(&mut self.damage));
    }

    /// The pending cell at `(x, y)`.
    #[must_use]
    pub fn cell(&self, x: i32, y: i32) -> Option<&Cell> {
        self.pending.cell(x, y)
    }

    /// Blit a rectangle from an off-screen buffer into the pending buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn blit(
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
        self.pending
            .blit_from_tracked(src, sx, sy, dx, dy, w, h, flags, Some(&mut self.damage));
    }

    /// Fill a rectangle of the pending buffer with one cell.
    pub fn fill(&mut self, dx: i32, dy: i32, w: i32, h: i32, cell: &Cell, flags: DrawFlags) {
        self.pending
            .fill_tracked(dx, dy, w, h, cell, flags, Some(&mut self.damage));
    }

    // --- Flushing -----------------------------------------------------------

    /// Reconcile the screen with the pending buffer.
    ///
    /// `cursor` optionally parks the terminal cursor afterwards (clipped to
    /// the grid). On failure damage is kept so the call can be retried.
    pub fn flush(&mut self, cursor: Option<(u16, u16)>) -> Result<()> {
        let mut out = io::stdout().lock();
        self.presenter
            .flush(&mut out, &self.pending, &mut self.damage, cursor)
            .map_err(Error::Io)
    }

    /// Rewrite every cell, ignoring the damage map.
    ///
    /// Reads the pending buffer when `from_pending` (synchronizing shadow
    /// state), otherwise re-emits the shadow as-is. Use after
    /// [`KeyCode::Resize`] or [`KeyCode::Restore`].
    pub fn full_flush(&mut self, from_pending: bool, cursor: Option<(u16, u16)>) -> Result<()> {
        let mut out = io::stdout().lock();
        let source = if from_pending {
            RedrawSource::Pending {
                buffer: &self.pending,
                damage: &mut self.damage,
            }
        } else {
            RedrawSource::Shadow
        };
        self.presenter
            .full_redraw(&mut out, source, cursor)
            .map_err(Error::Io)
    }

    // --- Modes --------------------------------------------------------------

    /// Read and optionally replace the runtime flags; returns the previous
    /// set. Each toggled bit emits exactly one escape.
    pub fn change_flags(&mut self, new: Option<RuntimeFlags>) -> Result<RuntimeFlags> {
        let old = self.flags;
        let Some(new) = new else {
            return Ok(old);
        };
        let diff = new ^ old;
        self.flags = new;
        if diff.is_empty() {
            return Ok(old);
        }

        let mut out = io::stdout().lock();
        if diff.contains(RuntimeFlags::HIDE_CURSOR) {
            if new.contains(RuntimeFlags::HIDE_CURSOR) {
                let seq = self
                    .db
                    .string(cap::STR_CURSOR_INVISIBLE)
                    .unwrap_or(ansi::CURSOR_HIDE);
                out.write_all(seq).map_err(Error::Io)?;
            } else {
                let wanted = if new.contains(RuntimeFlags::BRIGHT_CURSOR) {
                    cap::STR_CURSOR_VISIBLE
                } else {
                    cap::STR_CURSOR_NORMAL
                };
                let seq = self.db.string(wanted).unwrap_or(ansi::CURSOR_SHOW);
                out.write_all(seq).map_err(Error::Io)?;
            }
        } else if diff.contains(RuntimeFlags::BRIGHT_CURSOR)
            && !new.contains(RuntimeFlags::HIDE_CURSOR)
        {
            let wanted = if new.contains(RuntimeFlags::BRIGHT_CURSOR) {
                cap::STR_CURSOR_VISIBLE
            } else {
                cap::STR_CURSOR_NORMAL
            };
            if let Some(seq) = self.db.string(wanted) {
                out.write_all(seq).map_err(Error::Io)?;
            }
        }

        if diff.contains(RuntimeFlags::REVERSE_VIDEO) {
            ansi::reverse_video(&mut out, new.contains(RuntimeFlags::REVERSE_VIDEO))
                .map_err(Error::Io)?;
        }
        if diff.contains(RuntimeFlags::FOCUS_EVENTS) {
            ansi::focus_reporting(&mut out, new.contains(RuntimeFlags::FOCUS_EVENTS))
                .map_err(Error::Io)?;
        }
        out.flush().map_err(Error::Io)?;
        Ok(old)
    }

    /// Select the mouse reporting level.
    ///
    /// Leaving `Off` asserts the urxvt and SGR encodings first (SGR wins
    /// where both exist); entering `Off` explicitly turns the previous
    /// level off.
    pub fn set_mouse(&mut self, mode: MouseMode) -> Result<()> {
        let mut out = io::stdout().lock();
        if let Some(code) = mode.code() {
            if self.mouse_mode == MouseMode::Off {
                out.write_all(ansi::MOUSE_ENCODINGS).map_err(Error::Io)?;
            }
            ansi::mouse_level(&mut out, code, true).map_err(Error::Io)?;
        } else if let Some(previous) = self.mouse_mode.code() {
            ansi::mouse_level(&mut out, previous, false).map_err(Error::Io)?;
        }
        self.mouse_mode = mode;
        out.flush().map_err(Error::Io)?;
        Ok(())
    }

    /// The current mouse reporting level.
    #[must_use]
    pub const fn mouse_mode(&self) -> MouseMode {
        self.mouse_mode
    }

    /// Set the window title and/or icon name.
    pub fn set_title(&mut self, title: Option<&str>, icon: Option<&str>) -> Result<()> {
        let mut out = io::stdout().lock();
        if let Some(title) = title {
            ansi::window_title(&mut out, title).map_err(Error::Io)?;
        }
        if let Some(icon) = icon {
            ansi::icon_name(&mut out, icon).map_err(Error::Io)?;
        }
        out.flush().map_err(Error::Io)?;
        Ok(())
    }

    /// Ask the terminal to resize itself, then report the actual size.
    ///
    /// Terminals are free to ignore the request; compare the returned size
    /// with what was asked for. Buffers are not re-fit here — a honored
    /// request arrives as `SIGWINCH` and surfaces as [`KeyCode::Resize`].
    pub fn request_resize(&mut self, width: u16, height: u16) -> Result<(u16, u16)> {
        let mut out = io::stdout().lock();
        ansi::resize_request(&mut out, width, height).map_err(Error::Io)?;
        out.flush().map_err(Error::Io)?;
        unix::window_size().ok_or(Error::Size)
    }

    // --- Event loop ---------------------------------------------------------

    /// Wait for and decode the next input event.
    ///
    /// `None` timeout blocks forever; `Some(Duration::ZERO)` polls. Returns
    /// `Ok(None)` when the timeout expires with nothing to report. Resize
    /// and continue signals surface as [`KeyCode::Resize`] and
    /// [`KeyCode::Restore`] after their side effects (buffer re-fit,
    /// terminal state re-assertion) have run.
    pub fn read_key(&mut self, timeout: Option<Duration>) -> Result<Option<KeyEvent>> {
        if self.tty.buffered()
            && let Some(event) = self.decode_next()?
        {
            return Ok(Some(event));
        }

        let timeout_ms = timeout.map_or(-1, |d| d.as_millis().min(i32::MAX as u128) as i32);
        let ready = match self.tty.wait(timeout_ms) {
            Ok(n) => n as i32,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => -1,
            Err(err) => return Err(Error::Io(err)),
        };

        if self.cont_flag.swap(false, Ordering::SeqCst) {
            self.resume()?;
            return Ok(Some(KeyEvent::new(KeyCode::Restore)));
        }
        if self.resize_flag.swap(false, Ordering::SeqCst) {
            self.apply_resize()?;
            return Ok(Some(KeyEvent::new(KeyCode::Resize)));
        }
        if ready < 0 {
            return Err(Error::Io(io::ErrorKind::Interrupted.into()));
        }
        if ready > 0 {
            return self.decode_next();
        }
        Ok(None)
    }

    /// The decoded mouse event behind the last [`KeyCode::Mouse`].
    #[must_use]
    pub fn mouse_event(&self) -> Option<MouseEvent> {
        mouse::parse(&self.stash)
    }

    /// Raw bytes behind the last [`KeyCode::Mouse`] or [`KeyCode::Unknown`]
    /// event, for follow-up parsing or diagnosis.
    #[must_use]
    pub fn raw_key(&self) -> &[u8] {
        &self.stash
    }

    /// Decode one event from buffered bytes, if any are ready.
    fn decode_next(&mut self) -> Result<Option<KeyEvent>> {
        let Some(byte) = self.tty.next_byte().map_err(Error::Io)? else {
            return Ok(None);
        };
        if byte == 0x1B {
            return self.decode_escape().map(Some);
        }
        self.decode_plain(byte).map(Some)
    }

    /// Decode a non-ESC lead byte: control folding, or UTF-8 assembly when
    /// Unicode is on.
    fn decode_plain(&mut self, byte: u8) -> Result<KeyEvent> {
        let mut mods = Modifiers::empty();
        if byte < 0x80 {
            let ch = keys::fold_control(byte, &mut mods);
            return Ok(KeyEvent::new(KeyCode::Char(ch)).with_mods(mods));
        }

        self.stash.clear();
        self.stash.push(byte);
        if !self.unicode {
            // Byte-at-a-time mode: hand the byte through untranslated.
            return Ok(KeyEvent::new(KeyCode::Char(byte as char)));
        }
        if byte >= 0xC0 {
            let want = utf8_len(byte, true);
            while self.stash.len() < want {
                match self.tty.peek_byte().map_err(Error::Io)? {
                    Some(b @ 0x80..=0xBF) => {
                        self.tty.consume();
                        self.stash.push(b);
                    }
                    _ => break,
                }
            }
            if let Ok(text) = std::str::from_utf8(&self.stash)
                && let Some(ch) = text.chars().next()
            {
                return Ok(KeyEvent::new(KeyCode::Char(ch)));
            }
        }
        Ok(KeyEvent::new(KeyCode::Unknown))
    }

    /// Greedily read an escape-sequence body and classify it.
    ///
    /// A byte that is not immediately available ends the sequence, as does
    /// a following ESC (left buffered for the next event).
    fn decode_escape(&mut self) -> Result<KeyEvent> {
        self.stash.clear();
        self.stash.push(0x1B);
        while self.stash.len() < keys::MAX_SEQUENCE {
            match self.tty.peek_byte().map_err(Error::Io)? {
                None | Some(0x1B) => break,
                Some(byte) => {
                    self.tty.consume();
                    self.stash.push(byte);
                }
            }
        }

        let (code, mods) = keys::classify(
            &self.stash[1..],
            &self.key_table,
            self.flags.contains(RuntimeFlags::FOCUS_EVENTS),
        );
        Ok(KeyEvent::new(code).with_mods(mods))
    }

    /// Re-fit all buffers to the terminal's current size.
    fn apply_resize(&mut self) -> Result<()> {
        let (width, height) = unix::window_size()
            .or_else(|| db_size(&self.db))
            .ok_or(Error::Size)?;
        self.presenter.resize(width, height);
        self.damage.resize(width, height);
        self.pending.resize(width, height);
        tracing::debug!(width, height, "buffers re-fit");
        Ok(())
    }

    /// Re-assert everything after a host suspend.
    ///
    /// The terminal may have been resized and reconfigured while we were
    /// stopped, so: force a resize, re-enter raw/non-blocking mode, reset
    /// the style model, re-enter the alternate screen, replay the runtime
    /// flags through all-off, and re-assert mouse and keypad modes.
    fn resume(&mut self) -> Result<()> {
        self.resize_flag.store(false, Ordering::SeqCst);
        self.apply_resize()?;

        self.tty.set_nonblocking().map_err(Error::Io)?;
        self.tty.raw_mode(true).map_err(Error::Io)?;

        {
            let mut out = io::stdout().lock();
            self.presenter
                .set_style(&mut out, Color::DEFAULT, Color::DEFAULT, Attrs::empty())
                .map_err(Error::Io)?;
            if let Some(smcup) = self.db.string(cap::STR_ENTER_CA_MODE) {
                out.write_all(smcup).map_err(Error::Io)?;
            }
            out.flush().map_err(Error::Io)?;
        }

        let wanted = self.flags;
        self.flags = !wanted;
        self.change_flags(Some(wanted))?;

        let previous = self.mouse_mode;
        self.mouse_mode = MouseMode::Off;
        if previous != MouseMode::Off {
            self.set_mouse(previous)?;
        } else {
            self.set_mouse(MouseMode::Press)?;
            self.set_mouse(MouseMode::Off)?;
        }

        if let Some(smkx) = self.db.string(cap::STR_KEYPAD_XMIT) {
            let mut out = io::stdout().lock();
            out.write_all(smkx).map_err(Error::Io)?;
            out.flush().map_err(Error::Io)?;
        }
        tracing::info!("terminal state re-asserted after continue");
        Ok(())
    }

    /// Tear down explicitly. Equivalent to dropping, but the name makes
    /// the sequencing visible at call sites.
    pub fn close(mut self) {
        self.close_internal();
    }

    fn close_internal(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // Runtime flags back to defaults, through the all-off transition.
        self.flags = RuntimeFlags::all();
        let _ = self.change_flags(Some(RuntimeFlags::empty()));

        if let Some(id) = self.winch_id.take() {
            unregister(id);
        }
        if let Some(id) = self.cont_id.take() {
            unregister(id);
        }

        {
            let mut out = io::stdout().lock();
            let rmcup = self.db.string(cap::STR_EXIT_CA_MODE);
            if let Some(seq) = rmcup {
                let _ = out.write_all(seq);
            }
            // Without a restoring exit sequence, a hard reset is the only
            // way back to a sane screen.
            if rmcup.is_none() || self.db.flag(cap::BOOL_NON_REV_RMCUP) {
                let _ = out.write_all(ansi::HARD_RESET);
            }
            let _ = out.flush();
        }

        let _ = self.set_mouse(MouseMode::Off);
        if let Some(rmkx) = self.db.string(cap::STR_KEYPAD_LOCAL) {
            let mut out = io::stdout().lock();
            let _ = out.write_all(rmkx);
            let _ = out.flush();
        }

        self.tty.restore();
        tracing::info!("terminal restored");
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.close_internal();
    }
}

fn db_size(db: &Database) -> Option<(u16, u16)> {
    let cols = db.number(cap::NUM_COLUMNS)?;
    let lines = db.number(cap::NUM_LINES)?;
    if cols > 0 && lines > 0 {
        Some((cols as u16, lines as u16))
    } else {
        None
    }
}
