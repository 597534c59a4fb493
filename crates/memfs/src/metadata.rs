// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};

use crate::EntryType;
use crate::flags::Mode;
use crate::inode::{Inode, InodeID};

/// Metadata for one entry, as returned by `stat` and `fstat`
#[derive(Debug, Clone, PartialEq)]
pub struct FileStat {
    /// Inode number (None for directories)
    pub inode: Option<InodeID>,

    pub kind: EntryType,

    /// Logical size in bytes (zero for directories)
    pub size: u64,

    /// Directory entries naming the inode
    pub link_count: usize,

    /// Open files referencing the inode
    pub file_count: usize,

    pub owner_id: u32,
    pub group_id: u32,
    pub mode: Mode,

    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
}

impl From<&Inode> for FileStat {
    fn from(inode: &Inode) -> Self {
        Self {
            inode: Some(inode.id()),
            kind: EntryType::File,
            size: inode.size() as u64,
            link_count: inode.link_count(),
            file_count: inode.file_count(),
            owner_id: inode.owner_id(),
            group_id: inode.group_id(),
            mode: inode.mode(),
            created: inode.created(),
            modified: inode.modified(),
            accessed: inode.accessed(),
        }
    }
}

impl FileStat {
    /// Directories carry no store, counts or owner of their own.
    pub fn directory(created: DateTime<Utc>) -> Self {
        Self {
            inode: None,
            kind: EntryType::Directory,
            size: 0,
            link_count: 0,
            file_count: 0,
            owner_id: 0,
            group_id: 0,
            mode: Mode::user(),
            created,
            modified: created,
            accessed: created,
        }
    }
}

/// One named entry in a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryType,
}
