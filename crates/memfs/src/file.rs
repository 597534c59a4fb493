//! Open file instances and the fixed-capacity arena that pools them.

use std::ops::{Index, IndexMut};

use diagnostics::log_error;

use crate::error::{Error, Result};
use crate::inode::{Inode, InodeID};

/// Seek origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// SEEK_SET
    Set,
    /// SEEK_CUR
    Cur,
    /// SEEK_END
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Open,
    Closed,
}

/// Slot index of a DataFile within the file arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileID(usize);

/// The state of one open instance of a file.
#[derive(Debug, Clone)]
pub struct DataFile {
    inode: Option<InodeID>,
    seek: i64,
    status: FileStatus,
}

impl Default for DataFile {
    fn default() -> Self {
        Self {
            inode: None,
            seek: 0,
            status: FileStatus::Closed,
        }
    }
}

impl DataFile {
    #[cfg(test)]
    pub fn status(&self) -> FileStatus {
        self.status
    }

    #[cfg(test)]
    pub fn position(&self) -> i64 {
        self.seek
    }

    /// The inode this file reads and writes. Fails if the file is closed.
    pub fn inode(&self) -> Result<InodeID> {
        match (self.status, self.inode) {
            (FileStatus::Open, Some(id)) => Ok(id),
            _ => Err(Error::FileClosed),
        }
    }

    fn offset(&self) -> Result<usize> {
        usize::try_from(self.seek).map_err(|_| Error::InvalidOffset(self.seek))
    }

    /// Reads from `inode` at the cursor and advances it.
    pub fn read(&mut self, inode: &mut Inode, buf: &mut [u8]) -> Result<usize> {
        self.inode()?;
        let n = inode.read_at(self.offset()?, buf)?;
        self.seek += n as i64;
        Ok(n)
    }

    /// Writes to `inode` at the cursor and advances it.
    pub fn write(&mut self, inode: &mut Inode, buf: &[u8]) -> Result<usize> {
        self.inode()?;
        let n = inode.write_at(self.offset()?, buf)?;
        self.seek += n as i64;
        Ok(n)
    }

    /// Moves the cursor. The result is not clamped to `[0, size]`.
    pub fn seek(&mut self, size: usize, offset: i64, whence: Whence) -> Result<i64> {
        self.inode()?;
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => self.seek,
            Whence::End => i64::try_from(size).map_err(|_| Error::InvalidOffset(offset))?,
        };
        self.seek = base
            .checked_add(offset)
            .ok_or(Error::InvalidOffset(offset))?;
        Ok(self.seek)
    }

    /// Marks the file closed and hands back the inode it referenced.
    pub fn close(&mut self) -> Result<InodeID> {
        let inode = self.inode()?;
        self.inode = None;
        self.seek = 0;
        self.status = FileStatus::Closed;
        Ok(inode)
    }
}

/// A fixed pool of DataFile slots with a free stack.
#[derive(Debug)]
pub struct FileArena {
    slots: Vec<DataFile>,
    /// `free[used..]` are the available slots
    free: Vec<FileID>,
    used: usize,
}

impl FileArena {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![DataFile::default(); capacity],
            free: (0..capacity).map(FileID).collect(),
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn in_use(&self) -> usize {
        self.used
    }

    /// Takes a free slot and opens it on `inode`.
    ///
    /// Aborts if every slot is in use.
    pub fn allocate(&mut self, inode: &mut Inode) -> FileID {
        if self.used >= self.free.len() {
            log_error!("File arena exhausted at {capacity} open files", capacity: self.free.len());
            panic!("Out of file slots in file arena");
        }

        let id = self.free[self.used];
        self.used += 1;

        inode.increment_file_count();
        let file = &mut self.slots[id.0];
        file.inode = Some(inode.id());
        file.seek = 0;
        file.status = FileStatus::Open;
        id
    }

    /// Puts a slot back on the free stack.
    ///
    /// Aborts if no slot is in use.
    pub fn release(&mut self, id: FileID) {
        if self.used == 0 {
            log_error!("Over-freeing file slot {slot}", slot: id.0);
            panic!("Over-freeing file slots in file arena");
        }

        let file = &mut self.slots[id.0];
        file.inode = None;
        file.seek = 0;
        file.status = FileStatus::Closed;

        self.used -= 1;
        self.free[self.used] = id;
    }
}

impl Index<FileID> for FileArena {
    type Output = DataFile;

    fn index(&self, id: FileID) -> &DataFile {
        &self.slots[id.0]
    }
}

impl IndexMut<FileID> for FileArena {
    fn index_mut(&mut self, id: FileID) -> &mut DataFile {
        &mut self.slots[id.0]
    }
}
