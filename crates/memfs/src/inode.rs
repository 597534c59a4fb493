//! Inodes and the table that owns them.
//!
//! An inode is shared by the directory entries that name it and the open
//! files that reference it. It counts both, and gives its pages back to the
//! arena when the two counts are zero at the same time.

use std::ops::{Index, IndexMut};

use chrono::{DateTime, Utc};
use diagnostics::log_debug;

use crate::error::Result;
use crate::flags::Mode;
use crate::store::DataStore;

/// Unique identifier for an inode within its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InodeID(usize);

impl InodeID {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for InodeID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct Inode {
    id: InodeID,
    store: Box<dyn DataStore>,
    link_count: usize,
    file_count: usize,
    owner_id: u32,
    group_id: u32,
    mode: Mode,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    accessed: DateTime<Utc>,
    destroyed: bool,
}

impl Inode {
    /// A fresh inode with no links and no open files.
    pub fn new(id: InodeID, store: Box<dyn DataStore>, owner_id: u32, group_id: u32, mode: Mode) -> Self {
        let now = Utc::now();
        Self {
            id,
            store,
            link_count: 0,
            file_count: 0,
            owner_id,
            group_id,
            mode,
            created: now,
            modified: now,
            accessed: now,
            destroyed: false,
        }
    }

    pub fn id(&self) -> InodeID {
        self.id
    }

    pub fn link_count(&self) -> usize {
        self.link_count
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn owner_id(&self) -> u32 {
        self.owner_id
    }

    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn accessed(&self) -> DateTime<Utc> {
        self.accessed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn size(&self) -> usize {
        self.store.size()
    }

    pub fn increment_link_count(&mut self) {
        self.link_count += 1;
    }

    /// Returns true if this call destroyed the inode.
    pub fn decrement_link_count(&mut self) -> bool {
        if self.link_count == 0 {
            panic!("Bug: link count underflow on inode {}", self.id);
        }
        self.link_count -= 1;
        self.destroy_if_needed()
    }

    pub fn increment_file_count(&mut self) {
        self.file_count += 1;
    }

    /// Returns true if this call destroyed the inode.
    pub fn decrement_file_count(&mut self) -> bool {
        if self.file_count == 0 {
            panic!("Bug: file count underflow on inode {}", self.id);
        }
        self.file_count -= 1;
        self.destroy_if_needed()
    }

    /// Releases the store once nothing links to or holds the inode open.
    /// Repeated calls after destruction do nothing.
    pub fn destroy_if_needed(&mut self) -> bool {
        if self.destroyed || self.link_count != 0 || self.file_count != 0 {
            return false;
        }
        log_debug!(
            "Destroying inode {inode} holding {size} bytes",
            inode: self.id.as_usize(),
            size: self.store.size()
        );
        self.store.release();
        self.destroyed = true;
        true
    }

    pub fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let n = self.store.read(offset, buf)?;
        self.accessed = Utc::now();
        Ok(n)
    }

    pub fn write_at(&mut self, offset: usize, buf: &[u8]) -> Result<usize> {
        let n = self.store.write(offset, buf)?;
        let now = Utc::now();
        self.modified = now;
        self.accessed = now;
        Ok(n)
    }
}

impl std::fmt::Debug for Inode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inode")
            .field("id", &self.id)
            .field("size", &self.store.size())
            .field("link_count", &self.link_count)
            .field("file_count", &self.file_count)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Owns every live inode. Slots of destroyed inodes are reused.
#[derive(Debug, Default)]
pub struct InodeTable {
    slots: Vec<Option<Inode>>,
    free: Vec<InodeID>,
}

impl InodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, make: F) -> InodeID
    where
        F: FnOnce(InodeID) -> Inode,
    {
        match self.free.pop() {
            Some(id) => {
                self.slots[id.0] = Some(make(id));
                id
            }
            None => {
                let id = InodeID(self.slots.len());
                self.slots.push(Some(make(id)));
                id
            }
        }
    }

    pub fn get(&self, id: InodeID) -> Option<&Inode> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: InodeID) -> Option<&mut Inode> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, id: InodeID) -> Option<Inode> {
        let inode = self.slots.get_mut(id.0).and_then(Option::take)?;
        self.free.push(id);
        Some(inode)
    }

    /// Number of live inodes
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl Index<InodeID> for InodeTable {
    type Output = Inode;

    fn index(&self, id: InodeID) -> &Inode {
        match self.get(id) {
            Some(inode) => inode,
            None => panic!("Bug: dangling inode {id}"),
        }
    }
}

impl IndexMut<InodeID> for InodeTable {
    fn index_mut(&mut self, id: InodeID) -> &mut Inode {
        match self.get_mut(id) {
            Some(inode) => inode,
            None => panic!("Bug: dangling inode {id}"),
        }
    }
}
