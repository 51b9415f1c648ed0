//! Sorted directory table: path lookup by binary search, stable identity
//! by slab index.
//!
//! Entries live in a slab (`Vec<Option<FileEntry>>` addressed by index) so
//! that a caller can hold an index across lock drops even though the
//! sorted lookup vector shifts on insertion. Only readdir- and
//! rmdir-style traversals rely on positional order, and they do so while
//! holding the table lock for their entire scan, per the concurrency
//! model.

mod entry;

pub use entry::{FileEntry, Mode};

use crate::error::{BridgeError, Result};

/// Handle to an entry that survives table reshuffling.
pub type EntryId = usize;

pub struct Table {
    slab: Vec<Option<FileEntry>>,
    /// Sorted by path; parallel to nothing else, indexes into `slab`.
    order: Vec<(String, EntryId)>,
    next_inode: u64,
}

impl Table {
    /// Builds a table seeded with the root entry per bootstrap (§4.G). The
    /// root is DIR|READ|WRITE so implicit creates directly under `/`
    /// succeed (spec §8 scenario 2: "parent / ... is DIR+READ+WRITE").
    pub fn new() -> Self {
        let mut table = Table { slab: Vec::new(), order: Vec::new(), next_inode: 1 };
        let root_id = table.alloc(FileEntry::new("/".to_string(), Mode::DIR | Mode::READ | Mode::WRITE, 0));
        table.slab[root_id].as_mut().unwrap().inode = table.next_inode();
        table.order.push(("/".to_string(), root_id));
        table
    }

    fn next_inode(&mut self) -> u64 {
        let inode = self.next_inode;
        self.next_inode += 1;
        inode
    }

    fn alloc(&mut self, entry: FileEntry) -> EntryId {
        let id = self.slab.len();
        self.slab.push(Some(entry));
        id
    }

    /// Exact-match binary search. `Ok(pos)` is the index into `order` of an
    /// exact match; `Err(pos)` is the insertion point that keeps `order`
    /// sorted.
    fn search_position(&self, path: &str) -> std::result::Result<usize, usize> {
        self.order.binary_search_by(|(p, _)| p.as_str().cmp(path))
    }

    /// `search(path)` per §4.B: returns the live entry id if present.
    pub fn search(&self, path: &str) -> Option<EntryId> {
        match self.search_position(path) {
            Ok(pos) => Some(self.order[pos].1),
            Err(_) => None,
        }
    }

    /// Looks up an entry including soft-deleted ones when requested.
    pub fn find(&self, path: &str, include_deleted: bool) -> Option<EntryId> {
        let id = self.search(path)?;
        let entry = self.get(id);
        if entry.deleted && !include_deleted {
            None
        } else {
            Some(id)
        }
    }

    /// `get_parent(path)` per §4.B: truncates the last `/` component. The
    /// root's parent is the root itself.
    pub fn parent_path(path: &str) -> String {
        if path == "/" {
            return "/".to_string();
        }
        match path.rfind('/') {
            Some(0) => "/".to_string(),
            Some(i) => path[..i].to_string(),
            None => "/".to_string(),
        }
    }

    pub fn get(&self, id: EntryId) -> &FileEntry {
        self.slab[id].as_ref().expect("entry id never freed while mounted")
    }

    pub fn get_mut(&mut self, id: EntryId) -> &mut FileEntry {
        self.slab[id].as_mut().expect("entry id never freed while mounted")
    }

    /// `upsert(path, mode)` per §4.B: overwrite-in-place if present
    /// (clearing any soft-delete), else insert fresh at the sorted
    /// position with a new inode and current mtime.
    pub fn upsert(&mut self, path: &str, mode: Mode) -> EntryId {
        match self.search_position(path) {
            Ok(pos) => {
                let id = self.order[pos].1;
                let entry = self.get_mut(id);
                entry.mode = mode.normalize();
                entry.deleted = false;
                entry.touch();
                id
            }
            Err(pos) => {
                let inode = self.next_inode();
                let id = self.alloc(FileEntry::new(path.to_string(), mode, inode));
                self.order.insert(pos, (path.to_string(), id));
                id
            }
        }
    }

    /// Inserts a brand-new path known not to exist yet (create/mkdir),
    /// returning the fresh entry id.
    pub fn insert_new(&mut self, path: &str, mode: Mode) -> EntryId {
        self.upsert(path, mode)
    }

    /// Soft-deletes an entry (§4.B). Per §5's resource model, a deleted
    /// entry's retained buffer is *not* cleared here — it stays until the
    /// process exits or the entry is later overwritten by `upsert`.
    /// `rename` is the one caller that nulls a source's buffer, and it
    /// does so itself (by taking ownership of it for the destination)
    /// before calling this.
    pub fn mark_deleted(&mut self, id: EntryId) {
        let entry = self.get_mut(id);
        entry.deleted = true;
        entry.touch();
    }

    /// Validates that `path`'s parent exists, is a DIR, and is writable;
    /// returns the parent's entry id.
    pub fn writable_parent(&self, path: &str) -> Result<EntryId> {
        let parent_path = Self::parent_path(path);
        let parent_id = self.find(&parent_path, false).ok_or(BridgeError::NoSuchEntity)?;
        let parent = self.get(parent_id);
        if !parent.mode.is_dir() {
            return Err(BridgeError::NotADirectory);
        }
        if !parent.mode.contains(Mode::WRITE) {
            return Err(BridgeError::AccessDenied);
        }
        Ok(parent_id)
    }

    /// Direct children of `dir_path` per §4.B's enumeration rule, in
    /// sorted order, skipping soft-deleted entries. Each yielded name has
    /// any trailing `/` stripped.
    pub fn children(&self, dir_path: &str) -> Vec<(String, EntryId)> {
        let prefix_len = if dir_path == "/" { 0 } else { dir_path.len() };
        let scan_from = match self.search_position(dir_path) {
            Ok(pos) => pos + 1,
            Err(pos) => pos,
        };
        let mut out = Vec::new();
        for (path, id) in &self.order[scan_from..] {
            if prefix_len > 0 {
                if !path.starts_with(dir_path) {
                    break;
                }
                if path.as_bytes().get(prefix_len) != Some(&b'/') {
                    break;
                }
            } else if !path.starts_with('/') {
                break;
            }
            let rest = &path[prefix_len + 1..];
            let rest = rest.strip_suffix('/').unwrap_or(rest);
            if rest.is_empty() || rest.contains('/') {
                continue;
            }
            let entry = self.get(*id);
            if entry.deleted {
                continue;
            }
            out.push((rest.to_string(), *id));
        }
        out
    }

    /// True if any live entry lies strictly within `dir_path`'s subtree,
    /// at any depth (used by rmdir, which must refuse non-empty
    /// directories even when the live entry is several levels deep).
    pub fn has_live_descendant(&self, dir_path: &str) -> bool {
        let boundary = if dir_path == "/" { 0 } else { dir_path.len() };
        self.order.iter().any(|(path, id)| {
            path.len() > boundary
                && path.as_bytes()[boundary] == b'/'
                && (boundary == 0 || path.starts_with(dir_path))
                && !self.get(*id).deleted
        })
    }

    #[cfg(test)]
    pub fn is_sorted(&self) -> bool {
        self.order.windows(2).all(|w| w[0].0 < w[1].0)
    }
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_exists_on_construction() {
        let t = Table::new();
        let id = t.search("/").expect("root present");
        assert!(t.get(id).mode.is_dir());
    }

    #[test]
    fn root_is_writable_for_implicit_creates() {
        let t = Table::new();
        let id = t.search("/").expect("root present");
        assert!(t.get(id).mode.contains(Mode::WRITE));
    }

    #[test]
    fn insertion_preserves_sort_order() {
        let mut t = Table::new();
        t.upsert("/b", Mode::READ);
        t.upsert("/a", Mode::READ);
        t.upsert("/c", Mode::READ);
        assert!(t.is_sorted());
    }

    #[test]
    fn inodes_are_unique_and_nonzero() {
        let mut t = Table::new();
        let a = t.upsert("/a", Mode::READ);
        let b = t.upsert("/b", Mode::READ);
        assert_ne!(t.get(a).inode, t.get(b).inode);
        assert!(t.get(a).inode > 0);
        assert!(t.get(b).inode > 0);
    }

    #[test]
    fn parent_of_root_is_root() {
        assert_eq!(Table::parent_path("/"), "/");
        assert_eq!(Table::parent_path("/a"), "/");
        assert_eq!(Table::parent_path("/a/b"), "/a");
    }

    #[test]
    fn children_enumerates_direct_descendants_only() {
        let mut t = Table::new();
        t.upsert("/d", Mode::DIR);
        t.upsert("/d/x", Mode::READ);
        t.upsert("/d/sub", Mode::DIR);
        t.upsert("/d/sub/y", Mode::READ);
        t.upsert("/other", Mode::READ);
        let names: Vec<String> = t.children("/d").into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["sub".to_string(), "x".to_string()]);
    }

    #[test]
    fn deleted_entries_are_hidden_from_find_and_children() {
        let mut t = Table::new();
        let id = t.upsert("/a", Mode::READ);
        t.mark_deleted(id);
        assert!(t.find("/a", false).is_none());
        assert!(t.find("/a", true).is_some());
        assert!(t.children("/").is_empty());
    }

    #[test]
    fn mark_deleted_retains_the_buffer() {
        let mut t = Table::new();
        let id = t.upsert("/a", Mode::READ | Mode::WRITE | Mode::USER);
        t.get_mut(id).buffer = Some(crate::buffer::Buffer::from_bytes(b"keep me".to_vec()));
        t.mark_deleted(id);
        assert_eq!(t.get(id).buffer.as_ref().map(crate::buffer::Buffer::as_slice), Some(&b"keep me"[..]));
    }

    #[test]
    fn rmdir_blocked_by_live_descendant() {
        let mut t = Table::new();
        t.upsert("/d", Mode::DIR);
        t.upsert("/d/x", Mode::READ);
        assert!(t.has_live_descendant("/d"));
    }
}
