//! Hexes: a minimal ANSI terminal cell-grid runtime.
//!
//! # Role in Hexes
//! This crate is the user-facing entry point. It owns the [`Terminal`]
//! runtime — staged init/teardown, the event loop, raw mode, signals, and
//! the self-pipe — and re-exports the commonly used types from the internal
//! crates so application code does not need to wire each crate
//! individually.
//!
//! # How it fits in the system
//! - Capability store, probes, and input decoding: `hexes-core`
//! - Cell grid, damage tracking, and the diff presenter: `hexes-render`
//! - This crate ties them to an actual tty.
//!
//! If you only depend on one crate in your application, it should be
//! `hexes`.
//!
//! ```no_run
//! use hexes::prelude::*;
//!
//! let mut term = Terminal::new(InitOptions::default())?;
//! term.print("hello");
//! term.flush(None)?;
//! while let Some(key) = term.read_key(None)? {
//!     if key.is_char('q') {
//!         break;
//!     }
//! }
//! # Ok::<(), hexes::Error>(())
//! ```

use std::fmt;
use std::io;

#[cfg(unix)]
mod terminal;
#[cfg(unix)]
mod unix;

// --- Core re-exports -------------------------------------------------------

pub use hexes_core::event::{KeyCode, KeyEvent, Modifiers, MouseEvent};
pub use hexes_core::mouse::MouseMode;
pub use hexes_core::probe::Quirks;
pub use hexes_core::terminfo::{Database, SearchPath};

// --- Render re-exports -----------------------------------------------------

pub use hexes_render::buffer::{Buffer, DrawFlags};
pub use hexes_render::cell::{Attrs, Cell, Color, ColorKind};
pub use hexes_render::damage::DamageMap;
pub use hexes_render::presenter::Presenter;

// --- Runtime re-exports ----------------------------------------------------

#[cfg(unix)]
pub use terminal::{InitFlags, InitOptions, RuntimeFlags, Terminal};
#[cfg(unix)]
pub use unix::Waker;

// --- Errors ---------------------------------------------------------------

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// A signal handler could not be installed during init.
    Signal(io::Error),
    /// The line discipline or polling setup could not be changed.
    Input(io::Error),
    /// The terminal's dimensions could not be determined.
    Size,
    /// The terminal is smaller than the requested minimum; carries the
    /// actual size.
    TooSmall {
        /// Actual width.
        width: u16,
        /// Actual height.
        height: u16,
    },
    /// Unicode support was required but absent, or could not be probed.
    Unicode,
    /// I/O failure talking to the terminal.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(err) => write!(f, "installing signal handler: {err}"),
            Self::Input(err) => write!(f, "switching terminal input mode: {err}"),
            Self::Size => write!(f, "terminal size unavailable"),
            Self::TooSmall { width, height } => {
                write!(f, "terminal too small ({width}x{height})")
            }
            Self::Unicode => write!(f, "unicode support missing or unprobeable"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Signal(err) | Self::Input(err) | Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Standard result type for hexes APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Attrs, Buffer, Cell, Color, DrawFlags, Error, KeyCode, KeyEvent, Modifiers, MouseEvent,
        MouseMode, Result,
    };
    #[cfg(unix)]
    pub use crate::{InitFlags, InitOptions, RuntimeFlags, Terminal, Waker};
}

pub use hexes_core as core;
pub use hexes_render as render;
