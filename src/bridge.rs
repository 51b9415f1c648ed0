//! The bridge engine: ties the directory table and the controller
//! channel together under one lock (§5), and implements the contract of
//! every filesystem operation in §4.F.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::channel::{Channel, Response};
use crate::error::{BridgeError, Result};
use crate::handle::{HandleId, OpenHandle};
use crate::table::{EntryId, Mode, Table};

/// Attributes reported to the dispatcher for a `getattr`-shaped call.
pub struct Attr {
    pub inode: u64,
    pub size: u64,
    pub is_dir: bool,
    /// Unix permission bits only (no `S_IFREG`/`S_IFDIR`; the FUSE layer
    /// adds the file-type bits).
    pub perm: u32,
    pub nlink: u32,
    pub mtime: SystemTime,
}

pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Runtime configuration parsed from the command line (§4.G, §6).
pub struct BridgeConfig {
    pub mount_point: PathBuf,
    pub controller_argv: Vec<String>,
    pub other_users_level: u8,
    pub debug: bool,
}

struct BridgeState {
    table: Table,
    channel: Option<Channel>,
    handles: HashMap<HandleId, OpenHandle>,
}

pub struct Bridge {
    state: Mutex<BridgeState>,
    uid: u32,
    gid: u32,
    other_users: bool,
    mount_point: PathBuf,
    next_handle: AtomicU64,
    shutdown_requested: AtomicBool,
}

impl Bridge {
    /// Spawns the controller (if an argv was given), seeds the root
    /// directory, and issues `INIT`.
    pub fn new(config: BridgeConfig) -> Result<Bridge> {
        let mut table = Table::new();

        let channel = if config.controller_argv.is_empty() {
            None
        } else {
            let pid = std::process::id();
            let mut channel =
                Channel::spawn(&config.controller_argv, &config.mount_point, pid, config.debug)?;
            let response = channel.init()?;
            apply_directives(&mut table, &response);
            if !response.ok {
                tracing::warn!("controller rejected INIT");
            }
            Some(channel)
        };

        Ok(Bridge {
            state: Mutex::new(BridgeState { table, channel, handles: HashMap::new() }),
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            other_users: config.other_users_level > 0,
            mount_point: config.mount_point,
            next_handle: AtomicU64::new(1),
            shutdown_requested: AtomicBool::new(false),
        })
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Entered whenever a channel exchange returns a fatal error or a
    /// `QUIT` directive. Spawns `fusermount -u` against the mount point
    /// so the dispatcher's own loop unwinds the way a kernel-initiated
    /// unmount would, matching the source's use of `fuse_exit`.
    fn request_shutdown(&self) {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::error!("fatal controller error, unmounting");
        let mount_point = self.mount_point.clone();
        std::thread::spawn(move || {
            let status = std::process::Command::new("fusermount").arg("-u").arg(&mount_point).status();
            if status.map(|s| !s.success()).unwrap_or(true) {
                let _ = std::process::Command::new("umount").arg(&mount_point).status();
            }
        });
    }

    fn fail_if_fatal(&self, err: BridgeError) -> BridgeError {
        if err.is_fatal() {
            self.request_shutdown();
        }
        err
    }

    fn alloc_handle_id(&self) -> HandleId {
        self.next_handle.fetch_add(1, Ordering::SeqCst)
    }

    fn attr_for(&self, table: &Table, id: EntryId) -> Attr {
        let entry = table.get(id);
        let is_root = entry.path == "/";
        let is_dir = entry.mode.is_dir();

        let mut perm: u32 = 0;
        if entry.mode.contains(Mode::WRITE) {
            perm |= 0o200;
        }
        if entry.mode.contains(Mode::READ) {
            perm |= 0o400;
        }

        let (mut perm, nlink, size) = if is_root {
            (0o775, 2, 4096)
        } else if is_dir {
            (perm | 0o100, 2, 4096)
        } else {
            (perm, 1, entry.reported_size())
        };

        if self.other_users {
            if perm & 0o400 != 0 {
                perm |= 0o040 | 0o004;
            }
            if perm & 0o200 != 0 {
                perm |= 0o020 | 0o002;
            }
            if perm & 0o100 != 0 {
                perm |= 0o010 | 0o001;
            }
        }

        Attr { inode: entry.inode, size, is_dir, perm, nlink, mtime: entry.mtime }
    }

    /// getattr(path) per §4.F.
    pub fn getattr(&self, path: &str) -> Result<Attr> {
        let state = self.state.lock().unwrap();
        let id = state.table.find(path, false).ok_or(BridgeError::NoSuchEntity)?;
        Ok(self.attr_for(&state.table, id))
    }

    /// readdir(path) per §4.F: always emits `.` and `..` first, then the
    /// directory's live children in sorted order.
    pub fn readdir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let state = self.state.lock().unwrap();
        let id = state.table.find(path, false).ok_or(BridgeError::NoSuchEntity)?;
        if !state.table.get(id).mode.is_dir() {
            return Err(BridgeError::NotADirectory);
        }
        let mut out = vec![
            DirEntry { name: ".".to_string(), is_dir: true },
            DirEntry { name: "..".to_string(), is_dir: true },
        ];
        for (name, child_id) in state.table.children(path) {
            let is_dir = state.table.get(child_id).mode.is_dir();
            out.push(DirEntry { name, is_dir });
        }
        Ok(out)
    }

    /// Loads a handle's initial buffer per §4.E, issuing a `READ` to the
    /// controller when required. Must be called with the lock held.
    fn load_handle_buffer(
        state: &mut BridgeState,
        bridge: &Bridge,
        id: EntryId,
        read_only: bool,
    ) -> Result<crate::buffer::Buffer> {
        let entry_mode = state.table.get(id).mode;
        if entry_mode.is_user() {
            if let Some(buf) = state.table.get(id).buffer.clone() {
                return Ok(buf);
            }
            return Ok(crate::buffer::Buffer::new());
        }
        if read_only {
            let path = state.table.get(id).path.clone();
            let channel = state.channel.as_mut().ok_or(BridgeError::Protocol)?;
            let response = channel.read_file(&path).map_err(|e| bridge.fail_if_fatal(e))?;
            apply_directives(&mut state.table, &response);
            if response.quit {
                bridge.request_shutdown();
            }
            if !response.ok {
                return Err(BridgeError::NoSuchEntity);
            }
            return Ok(crate::buffer::Buffer::from_bytes(response.data.unwrap_or_default()));
        }
        Ok(crate::buffer::Buffer::new())
    }

    /// open(path, want_read, want_write) per §4.F/§4.E. Implicit create
    /// on a missing path is the caller's (FS layer's) responsibility per
    /// the spec's note that open attempts a write-only create on miss;
    /// this method only opens an existing entry.
    pub fn open(&self, path: &str, want_read: bool, want_write: bool) -> Result<HandleId> {
        let mut state = self.state.lock().unwrap();
        let id = state.table.find(path, false).ok_or(BridgeError::NoSuchEntity)?;
        let entry = state.table.get(id);
        if entry.mode.is_dir() {
            return Err(BridgeError::IsADirectory);
        }
        if want_read && !entry.mode.contains(Mode::READ) {
            return Err(BridgeError::AccessDenied);
        }
        if want_write && !entry.mode.contains(Mode::WRITE) {
            return Err(BridgeError::AccessDenied);
        }

        let mut handle_mode = Mode::empty();
        if want_read {
            handle_mode |= Mode::READ;
        }
        if want_write {
            handle_mode |= Mode::WRITE;
        }
        if entry.mode.is_user() {
            handle_mode |= Mode::USER;
        }

        let strictly_read_only = want_read && !want_write;
        let buffer = Bridge::load_handle_buffer(&mut state, self, id, strictly_read_only)?;
        state.table.get_mut(id).open_count += 1;

        let handle_id = self.alloc_handle_id();
        state.handles.insert(handle_id, OpenHandle::new(id, handle_mode, buffer));
        Ok(handle_id)
    }

    /// create(path) per §4.F: verifies the parent, upserts a fresh
    /// READ|WRITE|USER entry, and opens it write-only.
    pub fn create(&self, path: &str) -> Result<HandleId> {
        let mut state = self.state.lock().unwrap();
        state.table.writable_parent(path)?;
        let id = state.table.insert_new(path, Mode::READ | Mode::WRITE | Mode::USER);
        state.table.get_mut(id).open_count += 1;

        let handle_id = self.alloc_handle_id();
        let handle = OpenHandle::empty(id, Mode::READ | Mode::WRITE | Mode::USER);
        state.handles.insert(handle_id, handle);
        Ok(handle_id)
    }

    /// read(handle, offset, size) per §4.E.
    pub fn read(&self, handle_id: HandleId, offset: usize, size: usize) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let handle = state.handles.get(&handle_id).ok_or(BridgeError::BadFileDescriptor)?;
        Ok(handle.read(offset, size).to_vec())
    }

    /// write(handle, offset, data) per §4.E.
    pub fn write(&self, handle_id: HandleId, offset: usize, data: &[u8]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        let handle = state.handles.get_mut(&handle_id).ok_or(BridgeError::BadFileDescriptor)?;
        if !handle.mode.contains(Mode::WRITE) {
            return Err(BridgeError::BadFileDescriptor);
        }
        handle.write(offset, data);
        Ok(data.len())
    }

    /// release(handle) per §4.E: on a write-capable handle, sends the
    /// full buffer as a `WRITE`; on a USER entry, transfers buffer
    /// ownership into the entry's retained buffer regardless of which
    /// way the write went (matching the source, which always re-anchors
    /// the entry's buffer from whatever the handle ends with).
    pub fn release(&self, handle_id: HandleId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let handle = state.handles.remove(&handle_id).ok_or(BridgeError::BadFileDescriptor)?;
        let path = state.table.get(handle.entry_id).path.clone();
        let is_user = state.table.get(handle.entry_id).mode.is_user();

        if handle.mode.contains(Mode::WRITE) {
            if is_user {
                let bytes = handle.buffer_bytes().to_vec();
                state.table.get_mut(handle.entry_id).buffer = Some(crate::buffer::Buffer::from_bytes(bytes));
            } else {
                let bytes = handle.buffer_bytes().to_vec();
                let channel = state.channel.as_mut().ok_or(BridgeError::Protocol)?;
                let response = channel.write_file(&path, &bytes).map_err(|e| self.fail_if_fatal(e))?;
                apply_directives(&mut state.table, &response);
                if response.quit {
                    self.request_shutdown();
                }
                if !response.ok {
                    return Err(BridgeError::Io);
                }
            }
        }

        let entry = state.table.get_mut(handle.entry_id);
        entry.open_count = entry.open_count.saturating_sub(1);
        entry.touch();
        Ok(())
    }

    /// truncate(path, size) per §4.F: accepted as a no-op.
    pub fn truncate(&self, path: &str, _size: u64) -> Result<()> {
        let state = self.state.lock().unwrap();
        state.table.find(path, false).ok_or(BridgeError::NoSuchEntity)?;
        Ok(())
    }

    /// access(path, mask) per §4.F: `mask` uses the POSIX R_OK/W_OK/X_OK
    /// bit values.
    pub fn access(&self, path: &str, mask: u32) -> Result<()> {
        let state = self.state.lock().unwrap();
        let id = state.table.find(path, false).ok_or(BridgeError::NoSuchEntity)?;
        let attr = self.attr_for(&state.table, id);
        let wanted_read = mask & (libc::R_OK as u32) != 0;
        let wanted_write = mask & (libc::W_OK as u32) != 0;
        let wanted_exec = mask & (libc::X_OK as u32) != 0;
        if wanted_read && attr.perm & 0o400 == 0 {
            return Err(BridgeError::PermissionDenied);
        }
        if wanted_write && attr.perm & 0o200 == 0 {
            return Err(BridgeError::PermissionDenied);
        }
        if wanted_exec && attr.perm & 0o100 == 0 {
            return Err(BridgeError::PermissionDenied);
        }
        Ok(())
    }

    /// rename(from, to) per §4.F.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        let from_id = state.table.find(from, false).ok_or(BridgeError::NoSuchEntity)?;
        let from_entry = state.table.get(from_id);
        if from_entry.mode.is_dir() {
            return Err(BridgeError::IsADirectory);
        } else if !from_entry.mode.is_user() {
            return Err(BridgeError::AccessDenied);
        }

        if let Some(to_id) = state.table.find(to, false) {
            let to_entry = state.table.get(to_id);
            if to_entry.mode.is_dir() {
                return Err(BridgeError::IsADirectory);
            } else if !to_entry.mode.is_user() {
                return Err(BridgeError::AccessDenied);
            }
        } else {
            state.table.writable_parent(to)?;
        }

        let channel = state.channel.as_mut().ok_or(BridgeError::Protocol)?;
        let response = channel.fileop("rename", &[from, to]).map_err(|e| self.fail_if_fatal(e))?;
        apply_directives(&mut state.table, &response);
        if response.quit {
            self.request_shutdown();
        }
        if !response.ok {
            return Err(BridgeError::Io);
        }

        let mode = state.table.get(from_id).mode;
        let buffer = state.table.get_mut(from_id).buffer.take();
        let to_id = state.table.upsert(to, mode);
        state.table.get_mut(to_id).buffer = buffer;
        state.table.mark_deleted(from_id);
        Ok(())
    }

    /// unlink(path) per §4.F.
    pub fn unlink(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let id = state.table.find(path, false).ok_or(BridgeError::NoSuchEntity)?;
        let entry = state.table.get(id);
        if !entry.mode.is_user() {
            return Err(BridgeError::PermissionDenied);
        } else if entry.mode.is_dir() {
            return Err(BridgeError::IsADirectory);
        }
        let channel = state.channel.as_mut().ok_or(BridgeError::Protocol)?;
        let response = channel.fileop("unlink", &[path]).map_err(|e| self.fail_if_fatal(e))?;
        apply_directives(&mut state.table, &response);
        if response.quit {
            self.request_shutdown();
        }
        if !response.ok {
            return Err(BridgeError::Io);
        }
        state.table.mark_deleted(id);
        Ok(())
    }

    /// mkdir(path) per §4.F.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.table.writable_parent(path)?;
        let channel = state.channel.as_mut().ok_or(BridgeError::Protocol)?;
        let response = channel.fileop("mkdir", &[path]).map_err(|e| self.fail_if_fatal(e))?;
        apply_directives(&mut state.table, &response);
        if response.quit {
            self.request_shutdown();
        }
        if !response.ok {
            return Err(BridgeError::Io);
        }
        state.table.insert_new(path, Mode::DIR | Mode::READ | Mode::WRITE | Mode::USER);
        Ok(())
    }

    /// rmdir(path) per §4.F.
    pub fn rmdir(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let id = state.table.find(path, false).ok_or(BridgeError::NoSuchEntity)?;
        if !state.table.get(id).mode.is_dir() {
            return Err(BridgeError::NotADirectory);
        }
        if state.table.has_live_descendant(path) {
            return Err(BridgeError::NotEmpty);
        }
        let channel = state.channel.as_mut().ok_or(BridgeError::Protocol)?;
        let response = channel.fileop("rmdir", &[path]).map_err(|e| self.fail_if_fatal(e))?;
        apply_directives(&mut state.table, &response);
        if response.quit {
            self.request_shutdown();
        }
        if !response.ok {
            return Err(BridgeError::Io);
        }
        state.table.mark_deleted(id);
        Ok(())
    }

    /// Path existence check used by `open`'s implicit-create fallback in
    /// the FS layer.
    pub fn exists(&self, path: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.table.find(path, false).is_some()
    }

    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(channel) = state.channel.as_mut() {
            channel.shutdown();
        }
    }
}

/// Applies a response's `DIR` directive entries to the table. `QUIT` is
/// left for the caller to act on, since it needs the `Bridge` (not just
/// the table) to initiate shutdown.
fn apply_directives(table: &mut Table, response: &Response) {
    for (path, modes) in &response.dir_entries {
        table.upsert(path, Mode::parse(modes));
    }
}
