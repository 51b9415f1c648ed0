//! Maps `fuse_mt::FilesystemMT` callbacks onto the bridge (§4.F). This is
//! the only module that knows about `fuse`/`fuse_mt` types; everything
//! else works in plain paths, bytes, and `BridgeError`.

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fuse::FileType;
use fuse_mt::{
    CreatedEntry, DirectoryEntry, FileAttr, FilesystemMT, RequestInfo, ResultCreate, ResultData,
    ResultEmpty, ResultEntry, ResultOpen, ResultReaddir, ResultWrite,
};

use crate::bridge::{Attr, Bridge};

/// No cached attribute TTL: the controller can rename the namespace under
/// us at any time via an inline `DIR` directive, so every lookup goes back
/// to the table rather than trusting the kernel's attribute cache.
const NO_CACHE: Duration = Duration::from_secs(0);

pub struct UxfsFilesystem {
    bridge: Arc<Bridge>,
}

impl UxfsFilesystem {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        UxfsFilesystem { bridge }
    }

    fn path_string(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    fn join(parent: &Path, name: &OsStr) -> String {
        let name = name.to_string_lossy();
        if parent == Path::new("/") {
            format!("/{name}")
        } else {
            format!("{}/{name}", parent.to_string_lossy())
        }
    }

    fn to_fuse_attr(&self, attr: Attr) -> FileAttr {
        let kind = if attr.is_dir { FileType::Directory } else { FileType::RegularFile };
        FileAttr {
            size: attr.size,
            blocks: attr.size.div_ceil(512),
            atime: attr.mtime,
            mtime: attr.mtime,
            ctime: attr.mtime,
            crtime: attr.mtime,
            kind,
            perm: attr.perm as u16,
            nlink: attr.nlink,
            uid: self.bridge.uid(),
            gid: self.bridge.gid(),
            rdev: 0,
            flags: 0,
        }
    }

    fn unsupported(&self, op: &str, path: &Path) -> libc::c_int {
        tracing::info!(target: "uxfs::fs", op = %op, path = %path.display(), "operation not supported");
        libc::ENOSYS
    }
}

impl FilesystemMT for UxfsFilesystem {
    fn init(&self, _req: RequestInfo) -> ResultEmpty {
        Ok(())
    }

    fn destroy(&self, _req: RequestInfo) {
        self.bridge.shutdown();
    }

    fn getattr(&self, _req: RequestInfo, path: &Path, _fh: Option<u64>) -> ResultEntry {
        let attr = self.bridge.getattr(&Self::path_string(path)).map_err(libc::c_int::from)?;
        Ok((NO_CACHE, self.to_fuse_attr(attr)))
    }

    fn chmod(&self, _req: RequestInfo, path: &Path, _fh: Option<u64>, _mode: u32) -> ResultEmpty {
        Err(self.unsupported("chmod", path))
    }

    fn chown(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: Option<u64>,
        _uid: Option<u32>,
        _gid: Option<u32>,
    ) -> ResultEmpty {
        Err(self.unsupported("chown", path))
    }

    fn truncate(&self, _req: RequestInfo, path: &Path, _fh: Option<u64>, size: u64) -> ResultEmpty {
        self.bridge.truncate(&Self::path_string(path), size).map_err(Into::into)
    }

    fn utimens(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: Option<u64>,
        _atime: Option<std::time::SystemTime>,
        _mtime: Option<std::time::SystemTime>,
    ) -> ResultEmpty {
        // Timestamps are bridge-managed (touched on release); silently accept.
        let _ = path;
        Ok(())
    }

    fn readlink(&self, _req: RequestInfo, path: &Path) -> ResultData {
        Err(self.unsupported("readlink", path))
    }

    fn mknod(
        &self,
        _req: RequestInfo,
        parent: &Path,
        _name: &OsStr,
        _mode: u32,
        _rdev: u32,
    ) -> ResultEntry {
        Err(self.unsupported("mknod", parent))
    }

    fn mkdir(&self, _req: RequestInfo, parent: &Path, name: &OsStr, _mode: u32) -> ResultEntry {
        let path = Self::join(parent, name);
        self.bridge.mkdir(&path).map_err(libc::c_int::from)?;
        let attr = self.bridge.getattr(&path).map_err(libc::c_int::from)?;
        Ok((NO_CACHE, self.to_fuse_attr(attr)))
    }

    fn unlink(&self, _req: RequestInfo, parent: &Path, name: &OsStr) -> ResultEmpty {
        let path = Self::join(parent, name);
        self.bridge.unlink(&path).map_err(Into::into)
    }

    fn rmdir(&self, _req: RequestInfo, parent: &Path, name: &OsStr) -> ResultEmpty {
        let path = Self::join(parent, name);
        self.bridge.rmdir(&path).map_err(Into::into)
    }

    fn symlink(
        &self,
        _req: RequestInfo,
        parent: &Path,
        _name: &OsStr,
        _target: &Path,
    ) -> ResultEntry {
        Err(self.unsupported("symlink", parent))
    }

    fn rename(
        &self,
        _req: RequestInfo,
        parent: &Path,
        name: &OsStr,
        newparent: &Path,
        newname: &OsStr,
    ) -> ResultEmpty {
        let from = Self::join(parent, name);
        let to = Self::join(newparent, newname);
        self.bridge.rename(&from, &to).map_err(Into::into)
    }

    fn link(&self, _req: RequestInfo, path: &Path, _newparent: &Path, _newname: &OsStr) -> ResultEntry {
        Err(self.unsupported("link", path))
    }

    /// §4.F: a missing path is an implicit write-only create; any failure
    /// from that create is reported as *no-such-entity* regardless of its
    /// underlying cause, matching the spec's literal wording.
    fn open(&self, _req: RequestInfo, path: &Path, flags: u32) -> ResultOpen {
        let path_str = Self::path_string(path);
        let accmode = (flags as i32) & libc::O_ACCMODE;
        let want_read = accmode != libc::O_WRONLY;
        let want_write = accmode != libc::O_RDONLY;

        if !self.bridge.exists(&path_str) {
            let fh = self.bridge.create(&path_str).map_err(|_| libc::ENOENT)?;
            return Ok((fh, 0));
        }

        let fh = self.bridge.open(&path_str, want_read, want_write).map_err(libc::c_int::from)?;
        Ok((fh, 0))
    }

    fn read(
        &self,
        _req: RequestInfo,
        _path: &Path,
        fh: u64,
        offset: u64,
        size: u32,
        callback: impl FnOnce(Result<&[u8], libc::c_int>),
    ) {
        match self.bridge.read(fh, offset as usize, size as usize) {
            Ok(data) => callback(Ok(&data)),
            Err(e) => callback(Err(e.into())),
        }
    }

    fn write(
        &self,
        _req: RequestInfo,
        _path: &Path,
        fh: u64,
        offset: u64,
        data: Vec<u8>,
        _flags: u32,
    ) -> ResultWrite {
        self.bridge.write(fh, offset as usize, &data).map(|n| n as u32).map_err(Into::into)
    }

    fn flush(&self, _req: RequestInfo, _path: &Path, _fh: u64, _lock_owner: u64) -> ResultEmpty {
        // Buffered contents are only sent to the controller on release.
        Ok(())
    }

    fn release(
        &self,
        _req: RequestInfo,
        _path: &Path,
        fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> ResultEmpty {
        self.bridge.release(fh).map_err(Into::into)
    }

    fn fsync(&self, _req: RequestInfo, path: &Path, _fh: u64, _datasync: bool) -> ResultEmpty {
        Err(self.unsupported("fsync", path))
    }

    fn opendir(&self, _req: RequestInfo, _path: &Path, flags: u32) -> ResultOpen {
        Ok((0, flags))
    }

    fn readdir(&self, _req: RequestInfo, path: &Path, _fh: u64) -> ResultReaddir {
        let entries = self.bridge.readdir(&Self::path_string(path)).map_err(libc::c_int::from)?;
        Ok(entries
            .into_iter()
            .map(|e| DirectoryEntry {
                name: OsString::from(e.name),
                kind: if e.is_dir { FileType::Directory } else { FileType::RegularFile },
            })
            .collect())
    }

    fn releasedir(&self, _req: RequestInfo, _path: &Path, _fh: u64, _flags: u32) -> ResultEmpty {
        Ok(())
    }

    fn fsyncdir(&self, _req: RequestInfo, path: &Path, _fh: u64, _datasync: bool) -> ResultEmpty {
        Err(self.unsupported("fsyncdir", path))
    }

    fn statfs(&self, _req: RequestInfo, path: &Path) -> fuse_mt::ResultStatfs {
        Err(self.unsupported("statfs", path))
    }

    fn access(&self, _req: RequestInfo, path: &Path, mask: u32) -> ResultEmpty {
        self.bridge.access(&Self::path_string(path), mask).map_err(Into::into)
    }

    fn create(
        &self,
        _req: RequestInfo,
        parent: &Path,
        name: &OsStr,
        _mode: u32,
        flags: u32,
    ) -> ResultCreate {
        let path = Self::join(parent, name);
        let fh = self.bridge.create(&path).map_err(libc::c_int::from)?;
        let attr = self.bridge.getattr(&path).map_err(libc::c_int::from)?;
        Ok(CreatedEntry { ttl: NO_CACHE, attr: self.to_fuse_attr(attr), fh, flags })
    }
}
