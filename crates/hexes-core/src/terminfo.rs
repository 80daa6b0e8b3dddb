#![forbid(unsafe_code)]

//! Compiled terminfo database loading.
//!
//! Parses the binary format documented in term(5): a six-field little-endian
//! header followed by the name block, boolean bytes, a parity pad, the number
//! table, the string-offset table, and the NUL-separated string table. Both
//! on-disk flavors are understood — the legacy format (magic `0o432`, 16-bit
//! numbers) and the extended-integer format (magic `0o1036`, 32-bit numbers).
//!
//! Loading is best-effort by design: a missing or malformed database leaves
//! the caller with [`Database::empty`], which answers `false`/`None` for
//! every capability. Only the capabilities the library consumes are named in
//! [`cap`]; everything else is reachable by raw ordinal.

use std::path::{Path, PathBuf};

use memchr::memchr;

/// Legacy format magic: 16-bit numbers.
const MAGIC_LEGACY: u16 = 0o432;

/// Extended-integer format magic: 32-bit numbers.
const MAGIC_EXTENDED: u16 = 0o1036;

/// Capability ordinals, in curses numbering, for the subset the library uses.
pub mod cap {
    /// `nrrmc`: leaving ca mode does not restore the screen.
    pub const BOOL_NON_REV_RMCUP: usize = 24;

    /// `cols`: number of columns.
    pub const NUM_COLUMNS: usize = 0;
    /// `lines`: number of lines.
    pub const NUM_LINES: usize = 2;
    /// `colors`: maximum number of colors.
    pub const NUM_MAX_COLORS: usize = 13;

    /// `smcup`: enter ca (alternate screen) mode.
    pub const STR_ENTER_CA_MODE: usize = 28;
    /// `rmcup`: exit ca mode.
    pub const STR_EXIT_CA_MODE: usize = 40;
    /// `civis`: make cursor invisible.
    pub const STR_CURSOR_INVISIBLE: usize = 13;
    /// `cnorm`: make cursor normal.
    pub const STR_CURSOR_NORMAL: usize = 16;
    /// `cvvis`: make cursor very visible.
    pub const STR_CURSOR_VISIBLE: usize = 20;
    /// `smkx`: enter keypad-transmit mode.
    pub const STR_KEYPAD_XMIT: usize = 89;
    /// `rmkx`: leave keypad-transmit mode.
    pub const STR_KEYPAD_LOCAL: usize = 88;

    /// `ka1`, `kcuu1`, `ka3`, `kcub1`, `kb2`, `kcuf1`, `kc1`, `kcud1`, `kc3`.
    pub const STR_KEY_A1: usize = 139;
    pub const STR_KEY_UP: usize = 87;
    pub const STR_KEY_A3: usize = 140;
    pub const STR_KEY_LEFT: usize = 79;
    pub const STR_KEY_B2: usize = 141;
    pub const STR_KEY_RIGHT: usize = 83;
    pub const STR_KEY_C1: usize = 142;
    pub const STR_KEY_DOWN: usize = 61;
    pub const STR_KEY_C3: usize = 143;

    /// `knp`, `kpp`, `khome`, `kend`, `kich1`, `kdch1`, `kent`.
    pub const STR_KEY_NPAGE: usize = 81;
    pub const STR_KEY_PPAGE: usize = 82;
    pub const STR_KEY_HOME: usize = 76;
    pub const STR_KEY_END: usize = 164;
    pub const STR_KEY_INSERT: usize = 77;
    pub const STR_KEY_DELETE: usize = 59;
    pub const STR_KEY_ENTER: usize = 165;

    /// `kf1`..`kf12`.
    pub const STR_KEY_F1: usize = 66;
    pub const STR_KEY_F2: usize = 68;
    pub const STR_KEY_F3: usize = 69;
    pub const STR_KEY_F4: usize = 70;
    pub const STR_KEY_F5: usize = 71;
    pub const STR_KEY_F6: usize = 72;
    pub const STR_KEY_F7: usize = 73;
    pub const STR_KEY_F8: usize = 74;
    pub const STR_KEY_F9: usize = 75;
    pub const STR_KEY_F10: usize = 67;
    pub const STR_KEY_F11: usize = 216;
    pub const STR_KEY_F12: usize = 217;
}

/// A parsed terminfo entry.
///
/// Four capability tables addressed by ordinal: booleans, numbers, and
/// strings (via an offset table into one NUL-separated blob), plus the
/// terminal's name block.
#[derive(Debug, Clone, Default)]
pub struct Database {
    names: String,
    bools: Vec<bool>,
    numbers: Vec<i32>,
    offsets: Vec<i32>,
    strings: Vec<u8>,
}

impl Database {
    /// A database with no capabilities at all.
    ///
    /// Every accessor answers "absent". Used when no terminfo file can be
    /// located, so the rest of the library falls back to hardcoded ANSI.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a database from already-split tables. `strings[n]` is the
    /// capability value for string ordinal `n`, or `None` when absent.
    #[must_use]
    pub fn from_parts(
        names: &str,
        bools: Vec<bool>,
        numbers: Vec<i32>,
        strings: &[Option<&[u8]>],
    ) -> Self {
        let mut table = Vec::new();
        let mut offsets = Vec::with_capacity(strings.len());
        for entry in strings {
            match entry {
                Some(bytes) => {
                    offsets.push(table.len() as i32);
                    table.extend_from_slice(bytes);
                    table.push(0);
                }
                None => offsets.push(-1),
            }
        }
        Self {
            names: names.to_owned(),
            bools,
            numbers,
            offsets,
            strings: table,
        }
    }

    /// Parse a compiled terminfo image.
    ///
    /// Returns `None` for anything that is not a well-formed entry: unknown
    /// magic, a non-positive header field, a truncated body, a name or
    /// string table without its final NUL, or a string offset outside the
    /// table.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let mut r = Reader { data, pos: 0 };

        let magic = r.u16()?;
        let wide_numbers = match magic {
            MAGIC_LEGACY => false,
            MAGIC_EXTENDED => true,
            _ => return None,
        };

        let name_size = header_field(r.u16()?)?;
        let bool_size = header_field(r.u16()?)?;
        let num_count = header_field(r.u16()?)?;
        let offset_count = header_field(r.u16()?)?;
        let table_size = header_field(r.u16()?)?;

        let name_bytes = r.take(name_size)?;
        if name_bytes.last() != Some(&0) {
            return None;
        }
        let names = String::from_utf8_lossy(&name_bytes[..name_size - 1]).into_owned();

        let bools: Vec<bool> = r.take(bool_size)?.iter().map(|&b| b != 0).collect();

        // One pad byte keeps the number table 16-bit aligned.
        if (name_size + bool_size) % 2 == 1 {
            r.take(1)?;
        }

        let mut numbers = Vec::with_capacity(num_count);
        for _ in 0..num_count {
            let n = if wide_numbers { r.i32()? } else { i32::from(r.i16()?) };
            numbers.push(n);
        }

        let mut offsets = Vec::with_capacity(offset_count);
        for _ in 0..offset_count {
            let n = i32::from(r.i16()?);
            if n >= table_size as i32 {
                return None;
            }
            offsets.push(n);
        }

        let strings = r.take(table_size)?.to_vec();
        if strings.last() != Some(&0) {
            return None;
        }

        Some(Self {
            names,
            bools,
            numbers,
            offsets,
            strings,
        })
    }

    /// Load a compiled entry from a file.
    #[must_use]
    pub fn from_file(path: &Path) -> Option<Self> {
        let data = std::fs::read(path).ok()?;
        Self::from_bytes(&data)
    }

    /// Locate and load the entry for `term` along `search`'s directories.
    #[must_use]
    pub fn load(term: &str, search: &SearchPath) -> Option<Self> {
        search
            .candidates(term)
            .into_iter()
            .find_map(|path| Self::from_file(&path))
    }

    /// The terminal's name block (`name|alias|description`).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        if self.names.is_empty() {
            None
        } else {
            Some(&self.names)
        }
    }

    /// A boolean capability by ordinal. Absent ordinals are `false`.
    #[must_use]
    pub fn flag(&self, ordinal: usize) -> bool {
        self.bools.get(ordinal).copied().unwrap_or(false)
    }

    /// A numeric capability by ordinal. Negative stored values mean absent.
    #[must_use]
    pub fn number(&self, ordinal: usize) -> Option<i32> {
        match self.numbers.get(ordinal) {
            Some(&n) if n >= 0 => Some(n),
            _ => None,
        }
    }

    /// A string capability by ordinal, as the bytes up to its NUL.
    #[must_use]
    pub fn string(&self, ordinal: usize) -> Option<&[u8]> {
        let offset = *self.offsets.get(ordinal)?;
        if offset < 0 {
            return None;
        }
        let tail = self.strings.get(offset as usize..)?;
        let end = memchr(0, tail)?;
        Some(&tail[..end])
    }
}

fn header_field(raw: u16) -> Option<usize> {
    let n = raw as i16;
    if n <= 0 { None } else { Some(n as usize) }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let chunk = self.data.get(self.pos..self.pos + len)?;
        self.pos += len;
        Some(chunk)
    }

    fn u16(&mut self) -> Option<u16> {
        let b = self.take(2)?;
        Some(u16::from_le_bytes([b[0], b[1]]))
    }

    fn i16(&mut self) -> Option<i16> {
        let b = self.take(2)?;
        Some(i16::from_le_bytes([b[0], b[1]]))
    }

    fn i32(&mut self) -> Option<i32> {
        let b = self.take(4)?;
        Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// The directory list consulted when locating a compiled entry.
///
/// Captured as plain values so path resolution stays a pure function of its
/// inputs; [`SearchPath::from_env`] snapshots the process environment once.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    /// `$TERMINFO`: when set, the only directory consulted.
    pub terminfo: Option<PathBuf>,
    /// The user's home directory, for `~/.terminfo`.
    pub home: Option<PathBuf>,
    /// `$TERMINFO_DIRS`: colon-separated extra directories; an empty segment
    /// stands for `/etc/terminfo`.
    pub dirs: Option<String>,
}

impl SearchPath {
    /// Snapshot the search-relevant environment.
    ///
    /// `fallback_home` stands in for `$HOME` when the variable is unset
    /// (callers resolve it from the password database).
    #[must_use]
    pub fn from_env(fallback_home: Option<PathBuf>) -> Self {
        Self {
            terminfo: std::env::var_os("TERMINFO").map(PathBuf::from),
            home: std::env::var_os("HOME")
                .map(PathBuf::from)
                .or(fallback_home),
            dirs: std::env::var("TERMINFO_DIRS").ok(),
        }
    }

    /// Candidate files for `term`, in lookup order.
    ///
    /// Within a directory the file is `<dir>/<first char of name>/<name>`.
    #[must_use]
    pub fn candidates(&self, term: &str) -> Vec<PathBuf> {
        let Some(first) = term.chars().next() else {
            return Vec::new();
        };
        let entry = |dir: &Path| dir.join(first.to_string()).join(term);

        if let Some(dir) = &self.terminfo {
            return vec![entry(dir)];
        }

        let mut out = Vec::new();
        if let Some(home) = &self.home {
            out.push(entry(&home.join(".terminfo")));
        }

        let etc = Path::new("/etc/terminfo");
        let mut scanned_etc = false;
        if let Some(dirs) = &self.dirs {
            for segment in dirs.split(':') {
                if segment.is_empty() {
                    if !scanned_etc {
                        out.push(entry(etc));
                        scanned_etc = true;
                    }
                } else {
                    out.push(entry(Path::new(segment)));
                }
            }
        }

        if !scanned_etc {
            out.push(entry(etc));
        }
        out.push(entry(Path::new("/lib/terminfo")));
        out.push(entry(Path::new("/usr/share/terminfo")));
        out
    }
}
