//! Directories and the table that owns them.
//!
//! Directories name each other by [`DirID`] rather than by reference, so the
//! "." and ".." entries make a graph without ownership cycles.

use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use chrono::{DateTime, Utc};
use diagnostics::log_debug;

use crate::error::{Error, Result};
use crate::inode::InodeID;
use crate::path;

/// Stable handle for a directory in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirID(usize);

/// The root directory is always the first one created.
pub const ROOT_DIR: DirID = DirID(0);

impl DirID {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for DirID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a directory entry names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    File(InodeID),
    Dir(DirID),
}

/// Result of looking up the last component of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Entry),
    NotFound(String),
}

#[derive(Debug)]
pub struct Directory {
    entries: BTreeMap<String, Entry>,
    created: DateTime<Utc>,
}

impl Directory {
    fn new(id: DirID, parent: DirID) -> Self {
        let mut entries = BTreeMap::new();
        _ = entries.insert(".".to_string(), Entry::Dir(id));
        _ = entries.insert("..".to_string(), Entry::Dir(parent));
        Self {
            entries,
            created: Utc::now(),
        }
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn get(&self, name: &str) -> Option<Entry> {
        self.entries.get(name).copied()
    }

    pub fn insert(&mut self, name: &str, entry: Entry) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(Error::already_exists(name));
        }
        _ = self.entries.insert(name.to_string(), entry);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Entry> {
        self.entries.remove(name)
    }

    /// True when only "." and ".." remain
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 2
    }

    /// Named entries in name order, without "." and ".."
    pub fn iter(&self) -> impl Iterator<Item = (&str, Entry)> {
        self.entries
            .iter()
            .filter(|(name, _)| *name != "." && *name != "..")
            .map(|(name, entry)| (name.as_str(), *entry))
    }
}

/// Owns every directory. Slots are not reused, so a stale DirID never
/// aliases a newer directory.
#[derive(Debug)]
pub struct DirectoryTable {
    slots: Vec<Option<Directory>>,
}

impl Default for DirectoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryTable {
    /// A table holding only the root, which is its own parent.
    pub fn new() -> Self {
        Self {
            slots: vec![Some(Directory::new(ROOT_DIR, ROOT_DIR))],
        }
    }

    /// Creates an empty directory under `parent`. The caller inserts it
    /// into the parent's entries.
    pub fn create(&mut self, parent: DirID) -> DirID {
        let id = DirID(self.slots.len());
        self.slots.push(Some(Directory::new(id, parent)));
        log_debug!("Created directory {dir} under {parent}", dir: id.0, parent: parent.0);
        id
    }

    pub fn get(&self, id: DirID) -> Option<&Directory> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: DirID) -> Option<&mut Directory> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, id: DirID) -> Option<Directory> {
        let dir = self.slots.get_mut(id.0).and_then(Option::take)?;
        log_debug!("Removed directory {dir}", dir: id.0);
        Some(dir)
    }

    /// Number of live directories, the root included
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Walks the directory portion of `path` from `cwd` (or the root, for
    /// absolute paths) and returns the directory reached with the leaf name.
    ///
    /// Every segment before the leaf must name a directory. The leaf is not
    /// looked up and may be empty.
    pub fn resolve_dir_path<'p>(&self, cwd: DirID, path: &'p str) -> Result<(DirID, &'p str)> {
        let (dir_path, leaf) = path::split_path(path);
        let mut current = if path::is_absolute(path) { ROOT_DIR } else { cwd };

        for name in path::segments(dir_path) {
            let dir = self.get(current).ok_or_else(|| Error::path_not_found(path))?;
            current = match dir.get(name) {
                Some(Entry::Dir(next)) => next,
                Some(Entry::File(_)) => return Err(Error::not_a_directory(path)),
                None => return Err(Error::path_not_found(path)),
            };
        }

        if self.get(current).is_none() {
            return Err(Error::path_not_found(path));
        }
        Ok((current, leaf))
    }

    /// Resolves `path` and looks up its leaf in the directory reached.
    pub fn resolve_entry(&self, cwd: DirID, path: &str) -> Result<(DirID, Lookup)> {
        let (dir, leaf) = self.resolve_dir_path(cwd, path)?;
        let lookup = match self[dir].get(leaf) {
            Some(entry) => Lookup::Found(entry),
            None => Lookup::NotFound(leaf.to_string()),
        };
        Ok((dir, lookup))
    }

    /// Resolves the whole of `path`, leaf included, to a directory.
    /// An empty leaf means the directory portion itself.
    pub fn resolve_dir(&self, cwd: DirID, path: &str) -> Result<DirID> {
        if path.is_empty() {
            return Err(Error::empty_path());
        }
        let (dir, leaf) = self.resolve_dir_path(cwd, path)?;
        if leaf.is_empty() {
            return Ok(dir);
        }
        match self[dir].get(leaf) {
            Some(Entry::Dir(id)) => Ok(id),
            Some(Entry::File(_)) => Err(Error::not_a_directory(path)),
            None => Err(Error::path_not_found(path)),
        }
    }
}

impl Index<DirID> for DirectoryTable {
    type Output = Directory;

    fn index(&self, id: DirID) -> &Directory {
        match self.get(id) {
            Some(dir) => dir,
            None => panic!("Bug: dangling directory {id}"),
        }
    }
}

impl IndexMut<DirID> for DirectoryTable {
    fn index_mut(&mut self, id: DirID) -> &mut Directory {
        match self.get_mut(id) {
            Some(dir) => dir,
            None => panic!("Bug: dangling directory {id}"),
        }
    }
}
