//! Per-path file entries and their mode-bit grammar.

use std::time::SystemTime;

use bitflags::bitflags;

use crate::buffer::Buffer;

bitflags! {
    /// Mode bits on a directory-table entry. `USER` and `STATIC` are never
    /// produced directly from a controller mode-string letter beyond what
    /// `s` grants (`READ | WRITE | STATIC`); `USER` is set only when an
    /// entry is created through a filesystem `create`/`mkdir` call.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Mode: u8 {
        const READ   = 0b0_0001;
        const WRITE  = 0b0_0010;
        const DIR    = 0b0_0100;
        const USER   = 0b0_1000;
        const STATIC = 0b1_0000;
    }
}

impl Mode {
    /// Parses the controller's per-character mode grammar: `r` -> READ,
    /// `w` -> WRITE, `d` -> DIR, `s` -> READ|WRITE|STATIC (granted
    /// atomically), any other letter logs a warning and contributes READ.
    pub fn parse(letters: &str) -> Mode {
        let mut mode = Mode::empty();
        for ch in letters.chars() {
            mode |= match ch {
                'r' => Mode::READ,
                'w' => Mode::WRITE,
                'd' => Mode::DIR,
                's' => Mode::READ | Mode::WRITE | Mode::STATIC,
                other => {
                    tracing::warn!(letter = %other, "unrecognized mode letter, assuming read");
                    Mode::READ
                }
            };
        }
        mode.normalize()
    }

    /// Applies the invariants from the data model: directories are always
    /// readable and never carry a retained buffer; entries with neither
    /// READ nor WRITE get READ by default.
    pub fn normalize(mut self) -> Mode {
        if self.contains(Mode::DIR) {
            self |= Mode::READ;
        }
        if !self.intersects(Mode::READ | Mode::WRITE) {
            self |= Mode::READ;
        }
        self
    }

    pub fn is_dir(self) -> bool {
        self.contains(Mode::DIR)
    }

    pub fn is_user(self) -> bool {
        self.contains(Mode::USER)
    }

    /// STATIC entries report size from a retained buffer the same way USER
    /// entries do.
    pub fn reports_retained_size(self) -> bool {
        self.contains(Mode::USER) || self.contains(Mode::STATIC)
    }
}

/// A record in the directory table. Addressed by stable slab index, never
/// by its position in the sorted lookup vector (see `table::Table`).
#[derive(Debug)]
pub struct FileEntry {
    pub path: String,
    pub mode: Mode,
    pub mtime: SystemTime,
    pub inode: u64,
    pub open_count: u32,
    pub deleted: bool,
    /// Present only for USER/STATIC entries once they've been written to.
    pub buffer: Option<Buffer>,
}

impl FileEntry {
    pub fn new(path: String, mode: Mode, inode: u64) -> Self {
        let mode = mode.normalize();
        FileEntry {
            path,
            mode,
            mtime: SystemTime::now(),
            inode,
            open_count: 0,
            deleted: false,
            buffer: None,
        }
    }

    pub fn touch(&mut self) {
        self.mtime = SystemTime::now();
    }

    /// Length reported by getattr: retained-buffer length for USER/STATIC
    /// entries, zero for any other regular file, unused for directories.
    pub fn reported_size(&self) -> u64 {
        if self.mode.reports_retained_size() {
            self.buffer.as_ref().map(Buffer::len).unwrap_or(0) as u64
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_letters() {
        assert_eq!(Mode::parse("r"), Mode::READ);
        assert_eq!(Mode::parse("w"), Mode::WRITE);
        assert_eq!(Mode::parse("d"), Mode::DIR | Mode::READ);
        assert_eq!(Mode::parse("s"), Mode::READ | Mode::WRITE | Mode::STATIC);
    }

    #[test]
    fn parse_unknown_letter_assumes_read() {
        assert_eq!(Mode::parse("x"), Mode::READ);
    }

    #[test]
    fn neither_read_nor_write_gets_read() {
        assert_eq!(Mode::empty().normalize(), Mode::READ);
    }

    #[test]
    fn dir_forces_read() {
        assert!(Mode::DIR.normalize().contains(Mode::READ));
    }

    #[test]
    fn static_reports_retained_size_like_user() {
        assert!(Mode::STATIC.reports_retained_size());
        assert!(Mode::USER.reports_retained_size());
        assert!(!Mode::READ.reports_retained_size());
    }
}
