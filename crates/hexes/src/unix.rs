//! Unix tty plumbing: raw mode, readiness polling, and the self-pipe.
//!
//! This is the only module that talks to file descriptors. Input comes from
//! stdin plus the read end of a self-pipe; both are non-blocking and waited
//! on together with `poll(2)`, so a byte pushed into the pipe from another
//! thread wakes the event loop exactly like terminal input. The write end
//! of the pipe is the one cross-thread entry point of the library.
//!
//! Reads land in a small fixed buffer refilled on demand from whichever
//! descriptor last signalled ready; a read that would block clears the
//! ready marker. That "is a byte immediately available" distinction is what
//! the escape decoder uses to find the end of a sequence.

use std::io;
use std::os::unix::io::RawFd;
use std::path::PathBuf;

use nix::errno::Errno;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::poll::{PollFd, PollFlags, poll};
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use nix::unistd;

nix::ioctl_read_bad!(tiocgwinsz, libc::TIOCGWINSZ, libc::winsize);

const STDIN: RawFd = libc::STDIN_FILENO;
const STDOUT: RawFd = libc::STDOUT_FILENO;

/// Fixed read buffer size; escape sequences and typed input arrive in far
/// smaller chunks.
const INPUT_BUFFER: usize = 64;

fn io_err(err: Errno) -> io::Error {
    io::Error::from_raw_os_error(err as i32)
}

/// The terminal's reported size, when the ioctl works.
pub(crate) fn window_size() -> Option<(u16, u16)> {
    let mut ws = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // SAFETY: TIOCGWINSZ reads into a plain winsize struct and the fd is
    // not closed for the duration of the call.
    match unsafe { tiocgwinsz(STDOUT, &mut ws) } {
        Ok(_) => Some((ws.ws_col, ws.ws_row)),
        Err(_) => None,
    }
}

/// The home directory from the password database, for the terminfo search
/// path when `$HOME` is unset.
pub(crate) fn passwd_home() -> Option<PathBuf> {
    nix::unistd::User::from_uid(unistd::getuid())
        .ok()
        .flatten()
        .map(|user| user.dir)
}

/// Raw-mode terminal input with a self-pipe for cross-thread wakeups.
#[derive(Debug)]
pub(crate) struct Tty {
    saved_termios: Termios,
    saved_flags: OFlag,
    pipe_read: RawFd,
    pipe_write: RawFd,
    buf: [u8; INPUT_BUFFER],
    len: usize,
    pos: usize,
    /// The descriptor that last signalled ready and may still have data.
    pending: Option<RawFd>,
}

impl Tty {
    /// Capture the current line discipline, create the self-pipe, switch
    /// everything to non-blocking, and enter raw mode.
    pub(crate) fn open() -> io::Result<Self> {
        let saved_termios = termios::tcgetattr(STDIN).map_err(io_err)?;
        let saved_flags =
            OFlag::from_bits_truncate(fcntl(STDIN, FcntlArg::F_GETFL).map_err(io_err)?);
        let (pipe_read, pipe_write) = unistd::pipe().map_err(io_err)?;

        let tty = Self {
            saved_termios,
            saved_flags,
            pipe_read,
            pipe_write,
            buf: [0; INPUT_BUFFER],
            len: 0,
            pos: 0,
            pending: None,
        };

        if let Err(err) = tty.set_nonblocking().and_then(|()| tty.raw_mode(true)) {
            let _ = fcntl(STDIN, FcntlArg::F_SETFL(tty.saved_flags));
            let _ = unistd::close(pipe_read);
            let _ = unistd::close(pipe_write);
            return Err(err);
        }
        Ok(tty)
    }

    /// Switch the line discipline: one byte at a time, no echo. Disabling
    /// restores the state captured at open.
    pub(crate) fn raw_mode(&self, enable: bool) -> io::Result<()> {
        if enable {
            let mut state = self.saved_termios.clone();
            state
                .local_flags
                .remove(LocalFlags::ICANON | LocalFlags::ECHO);
            state.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
            termios::tcsetattr(STDIN, SetArg::TCSANOW, &state).map_err(io_err)
        } else {
            termios::tcsetattr(STDIN, SetArg::TCSANOW, &self.saved_termios).map_err(io_err)
        }
    }

    /// Put stdin and the pipe read end into non-blocking mode.
    pub(crate) fn set_nonblocking(&self) -> io::Result<()> {
        let pipe_flags =
            OFlag::from_bits_truncate(fcntl(self.pipe_read, FcntlArg::F_GETFL).map_err(io_err)?);
        fcntl(
            self.pipe_read,
            FcntlArg::F_SETFL(pipe_flags | OFlag::O_NONBLOCK),
        )
        .map_err(io_err)?;
        fcntl(
            STDIN,
            FcntlArg::F_SETFL(self.saved_flags | OFlag::O_NONBLOCK),
        )
        .map_err(io_err)?;
        Ok(())
    }

    /// Whether bytes are buffered or a descriptor is still marked ready.
    pub(crate) fn buffered(&self) -> bool {
        self.pos < self.len || self.pending.is_some()
    }

    /// Wait for readiness on the terminal or the self-pipe.
    ///
    /// `timeout_ms` follows poll(2): `-1` blocks forever, `0` polls.
    /// Returns the number of ready descriptors (0 on timeout) and records
    /// which one to read next. A signal interruption surfaces as an
    /// [`io::ErrorKind::Interrupted`] error so the caller can consult its
    /// signal flags.
    pub(crate) fn wait(&mut self, timeout_ms: i32) -> io::Result<usize> {
        let mut fds = [
            PollFd::new(STDIN, PollFlags::POLLIN),
            PollFd::new(self.pipe_read, PollFlags::POLLIN),
        ];
        let ready = poll(&mut fds, timeout_ms).map_err(io_err)?;
        if ready > 0 {
            let readable = |fd: &PollFd| {
                fd.revents().is_some_and(|r| {
                    r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
                })
            };
            if readable(&fds[0]) {
                self.pending = Some(STDIN);
            } else if readable(&fds[1]) {
                self.pending = Some(self.pipe_read);
            }
        }
        Ok(ready as usize)
    }

    /// Refill the buffer from the pending descriptor.
    ///
    /// Returns whether any bytes arrived. A would-block read (or EOF)
    /// clears the pending marker.
    fn fill(&mut self) -> io::Result<bool> {
        let Some(fd) = self.pending else {
            return Ok(false);
        };
        loop {
            match unistd::read(fd, &mut self.buf) {
                Ok(0) => {
                    self.pending = None;
                    return Ok(false);
                }
                Ok(n) => {
                    self.len = n;
                    self.pos = 0;
                    return Ok(true);
                }
                Err(Errno::EAGAIN) => {
                    self.pending = None;
                    return Ok(false);
                }
                Err(Errno::EINTR) => {}
                Err(err) => return Err(io_err(err)),
            }
        }
    }

    /// Next buffered byte, refilling non-blockingly. `None` means nothing
    /// is immediately available.
    pub(crate) fn next_byte(&mut self) -> io::Result<Option<u8>> {
        match self.peek_byte()? {
            Some(byte) => {
                self.pos += 1;
                Ok(Some(byte))
            }
            None => Ok(None),
        }
    }

    /// Like [`Self::next_byte`] without consuming, so the escape decoder
    /// can stop at a following ESC and leave it for the next event.
    pub(crate) fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        if self.pos >= self.len && !self.fill()? {
            return Ok(None);
        }
        Ok(Some(self.buf[self.pos]))
    }

    /// Consume the byte returned by the last [`Self::peek_byte`].
    pub(crate) fn consume(&mut self) {
        debug_assert!(self.pos < self.len);
        self.pos += 1;
    }

    /// A cross-thread handle writing into the self-pipe.
    pub(crate) fn waker(&self) -> Waker {
        Waker {
            fd: self.pipe_write,
        }
    }

    /// Restore descriptor flags and the line discipline, close the pipe.
    pub(crate) fn restore(&mut self) {
        let _ = unistd::close(self.pipe_read);
        let _ = unistd::close(self.pipe_write);
        let _ = fcntl(STDIN, FcntlArg::F_SETFL(self.saved_flags));
        let _ = self.raw_mode(false);
    }
}

/// Cross-thread input injection handle.
///
/// Writes land in the event loop's self-pipe and surface as ordinary input
/// bytes. This is the library's only thread-safe entry point; the write is
/// atomic up to the pipe's kernel buffer. A waker outlives its terminal
/// only in the sense that pushes then fail with `EBADF`.
#[derive(Debug, Clone, Copy)]
pub struct Waker {
    fd: RawFd,
}

impl Waker {
    /// Inject bytes into the event loop.
    pub fn push(&self, bytes: &[u8]) -> io::Result<usize> {
        unistd::write(self.fd, bytes).map_err(io_err)
    }
}
