// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Per-process state: the descriptor table, the working directory, and the
//! path-based operations.

use std::collections::BTreeMap;

use diagnostics::{log_debug, log_error, log_warn};

use crate::dir::{DirID, Entry, Lookup, ROOT_DIR};
use crate::error::{Error, Result};
use crate::file::{FileID, Whence};
use crate::flags::{AccessFlag, Mode};
use crate::global::{GlobalState, State, StdStream};
use crate::metadata::{DirEntry, FileStat};
use crate::path;

/// A small per-process integer naming an open file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileDescriptor(usize);

impl FileDescriptor {
    pub const STDIN: FileDescriptor = FileDescriptor(0);
    pub const STDOUT: FileDescriptor = FileDescriptor(1);
    pub const STDERR: FileDescriptor = FileDescriptor(2);

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl From<usize> for FileDescriptor {
    fn from(fd: usize) -> Self {
        Self(fd)
    }
}

impl std::fmt::Display for FileDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a descriptor is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenFile {
    Stream(StdStream),
    Data(FileID),
}

/// One process's view of the shared file store.
///
/// Descriptors 0, 1 and 2 are bound to the standard stream placeholders for
/// the life of the process. Other descriptors are taken from a fixed stack,
/// so the most recently closed one is the next one handed out.
pub struct ProcState {
    global: GlobalState,
    generation: u64,
    table: BTreeMap<FileDescriptor, OpenFile>,
    /// `free[next_free..]` are the unused descriptors
    free: Vec<FileDescriptor>,
    next_free: usize,
    cwd: DirID,
    owner_id: u32,
    group_id: u32,
}

impl ProcState {
    /// A process rooted at `/`, bound to the current generation of `global`.
    pub fn new(global: &GlobalState) -> Result<Self> {
        let generation = global.generation()?;
        let config = global.config()?;

        let mut table = BTreeMap::new();
        for (fd, stream) in StdStream::all().into_iter().enumerate() {
            _ = table.insert(FileDescriptor(fd), OpenFile::Stream(stream));
        }

        Ok(Self {
            global: global.clone(),
            generation,
            table,
            free: (3..3 + config.max_descriptors).map(FileDescriptor).collect(),
            next_free: 0,
            cwd: ROOT_DIR,
            owner_id: config.owner_id,
            group_id: config.group_id,
        })
    }

    pub fn cwd(&self) -> DirID {
        self.cwd
    }

    /// Descriptors currently bound, the standard streams included
    pub fn descriptors(&self) -> Vec<FileDescriptor> {
        self.table.keys().copied().collect()
    }

    fn with_state<F, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut State) -> Result<T>,
    {
        self.global.with_state(self.generation, op)
    }

    fn allocate_fd(&mut self) -> FileDescriptor {
        if self.next_free >= self.free.len() {
            log_error!("Descriptor table exhausted at {max} descriptors", max: self.free.len());
            panic!("Out of file descriptors");
        }
        let fd = self.free[self.next_free];
        self.next_free += 1;
        fd
    }

    fn release_fd(&mut self, fd: FileDescriptor) {
        if self.next_free == 0 {
            log_error!("Over-freeing descriptor {fd}", fd: fd.0);
            panic!("Over-freeing file descriptors");
        }
        self.next_free -= 1;
        self.free[self.next_free] = fd;
    }

    fn data_file(&self, fd: FileDescriptor) -> Result<FileID> {
        match self.table.get(&fd) {
            Some(OpenFile::Data(file)) => Ok(*file),
            Some(OpenFile::Stream(_)) => Err(Error::wrong_file_type(fd.to_string())),
            None => Err(Error::DescriptorNotFound(fd)),
        }
    }

    /// Opens the file at `path`, creating it when `flags` has `O_CREAT`
    /// and nothing is there. `mode` applies only to a created file.
    pub fn open(&mut self, path: &str, flags: AccessFlag, mode: Mode) -> Result<FileDescriptor> {
        let cwd = self.cwd;
        let (owner_id, group_id) = (self.owner_id, self.group_id);

        let file = self.with_state(|state| {
            let (dir, lookup) = state.dirs.resolve_entry(cwd, path)?;
            let inode = match lookup {
                Lookup::Found(Entry::File(id)) => id,
                Lookup::Found(Entry::Dir(_)) => return Err(Error::wrong_file_type(path)),
                Lookup::NotFound(leaf) if leaf.is_empty() => return Err(Error::empty_path()),
                Lookup::NotFound(leaf) if flags.contains(AccessFlag::O_CREAT) => {
                    let id = state.create_inode(owner_id, group_id, mode);
                    state.dirs[dir].insert(&leaf, Entry::File(id))?;
                    id
                }
                Lookup::NotFound(_) => return Err(Error::path_not_found(path)),
            };
            Ok(state.open_inode(inode))
        })?;

        let fd = self.allocate_fd();
        _ = self.table.insert(fd, OpenFile::Data(file));
        log_debug!("Opened {path} as descriptor {fd}", path: path, fd: fd.0);
        Ok(fd)
    }

    /// Unbinds `fd` and closes its file. The standard streams cannot be
    /// closed.
    pub fn close(&mut self, fd: FileDescriptor) -> Result<()> {
        let file = self.data_file(fd)?;
        self.with_state(|state| state.close_file(file))?;

        _ = self.table.remove(&fd);
        self.release_fd(fd);
        log_debug!("Closed descriptor {fd}", fd: fd.0);
        Ok(())
    }

    pub fn read(&mut self, fd: FileDescriptor, buf: &mut [u8]) -> Result<usize> {
        let file = self.data_file(fd)?;
        self.with_state(|state| state.read_file(file, buf))
    }

    pub fn write(&mut self, fd: FileDescriptor, buf: &[u8]) -> Result<usize> {
        let file = self.data_file(fd)?;
        self.with_state(|state| state.write_file(file, buf))
    }

    /// Moves the cursor of `fd` and returns its new position.
    pub fn seek(&mut self, fd: FileDescriptor, offset: i64, whence: Whence) -> Result<i64> {
        let file = self.data_file(fd)?;
        self.with_state(|state| state.seek_file(file, offset, whence))
    }

    /// Removes the entry at `path`. The inode's storage is released once no
    /// other entry names it and no descriptor holds it open.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let cwd = self.cwd;
        self.with_state(|state| {
            let (dir, lookup) = state.dirs.resolve_entry(cwd, path)?;
            match lookup {
                Lookup::Found(Entry::File(id)) => {
                    let (_, leaf) = path::split_path(path);
                    _ = state.dirs[dir].remove(leaf);
                    state.unlink_inode(id);
                    log_debug!("Unlinked {path}", path: path);
                    Ok(())
                }
                Lookup::Found(Entry::Dir(_)) => Err(Error::wrong_file_type(path)),
                Lookup::NotFound(leaf) if leaf.is_empty() => Err(Error::empty_path()),
                Lookup::NotFound(_) => Err(Error::path_not_found(path)),
            }
        })
    }

    /// Adds `dst` as another name for the file at `src`.
    pub fn link(&mut self, src: &str, dst: &str) -> Result<()> {
        let cwd = self.cwd;
        self.with_state(|state| {
            let (_, lookup) = state.dirs.resolve_entry(cwd, src)?;
            let id = match lookup {
                Lookup::Found(Entry::File(id)) => id,
                Lookup::Found(Entry::Dir(_)) => return Err(Error::wrong_file_type(src)),
                Lookup::NotFound(leaf) if leaf.is_empty() => return Err(Error::empty_path()),
                Lookup::NotFound(_) => return Err(Error::path_not_found(src)),
            };

            let (dir, leaf) = state.dirs.resolve_dir_path(cwd, dst)?;
            if leaf.is_empty() {
                return Err(Error::empty_path());
            }
            if state.dirs[dir].get(leaf).is_some() {
                return Err(Error::already_exists(dst));
            }
            state.dirs[dir].insert(leaf, Entry::File(id))?;
            state.link_inode(id);
            log_debug!("Linked {src} to {dst}", src: src, dst: dst);
            Ok(())
        })
    }

    /// Links `dst` then unlinks `src`. If the unlink fails the new name is
    /// kept and the error returned.
    pub fn rename(&mut self, src: &str, dst: &str) -> Result<()> {
        self.link(src, dst)?;
        if let Err(err) = self.unlink(src) {
            log_warn!("Rename left both {src} and {dst}: {error}", src: src, dst: dst, error: err);
            return Err(err);
        }
        Ok(())
    }

    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let cwd = self.cwd;
        self.with_state(|state| {
            let (parent, leaf) = state.dirs.resolve_dir_path(cwd, path)?;
            if leaf.is_empty() {
                return Err(Error::empty_path());
            }
            if state.dirs[parent].get(leaf).is_some() {
                return Err(Error::already_exists(path));
            }
            let id = state.dirs.create(parent);
            state.dirs[parent].insert(leaf, Entry::Dir(id))
        })
    }

    /// Changes the working directory to the directory named by all of `path`.
    pub fn chdir(&mut self, path: &str) -> Result<()> {
        let cwd = self.cwd;
        self.cwd = self.with_state(|state| state.dirs.resolve_dir(cwd, path))?;
        Ok(())
    }

    /// Removes an empty directory. The root and this process's working
    /// directory are busy, as are "." and "..".
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let cwd = self.cwd;
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(if path.is_empty() {
                Error::empty_path()
            } else {
                Error::busy(path)
            });
        }

        self.with_state(|state| {
            let (parent, leaf) = state.dirs.resolve_dir_path(cwd, trimmed)?;
            if leaf == "." || leaf == ".." {
                return Err(Error::busy(path));
            }
            let id = match state.dirs[parent].get(leaf) {
                Some(Entry::Dir(id)) => id,
                Some(Entry::File(_)) => return Err(Error::not_a_directory(path)),
                None => return Err(Error::path_not_found(path)),
            };
            if id == ROOT_DIR || id == cwd {
                return Err(Error::busy(path));
            }
            if !state.dirs[id].is_empty() {
                return Err(Error::directory_not_empty(path));
            }

            _ = state.dirs[parent].remove(leaf);
            _ = state.dirs.remove(id);
            Ok(())
        })
    }

    pub fn stat(&self, path: &str) -> Result<FileStat> {
        if path.is_empty() {
            return Err(Error::empty_path());
        }
        let cwd = self.cwd;
        self.with_state(|state| {
            let (dir, leaf) = state.dirs.resolve_dir_path(cwd, path)?;
            let entry = if leaf.is_empty() {
                Entry::Dir(dir)
            } else {
                state.dirs[dir]
                    .get(leaf)
                    .ok_or_else(|| Error::path_not_found(path))?
            };
            Ok(match entry {
                Entry::File(id) => FileStat::from(&state.inodes[id]),
                Entry::Dir(id) => FileStat::directory(state.dirs[id].created()),
            })
        })
    }

    pub fn fstat(&self, fd: FileDescriptor) -> Result<FileStat> {
        let file = self.data_file(fd)?;
        self.with_state(|state| Ok(FileStat::from(state.file_inode(file)?)))
    }

    /// Lists the directory at `path` by name, without "." and "..".
    pub fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let cwd = self.cwd;
        self.with_state(|state| {
            let id = state.dirs.resolve_dir(cwd, path)?;
            Ok(state.dirs[id]
                .iter()
                .map(|(name, entry)| DirEntry {
                    name: name.to_string(),
                    kind: entry.into(),
                })
                .collect())
        })
    }
}

impl std::fmt::Debug for ProcState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcState")
            .field("generation", &self.generation)
            .field("cwd", &self.cwd)
            .field("descriptors", &self.table.len())
            .finish()
    }
}

impl Drop for ProcState {
    fn drop(&mut self) {
        let open: Vec<_> = self
            .table
            .iter()
            .filter(|(_, file)| matches!(file, OpenFile::Data(_)))
            .map(|(fd, _)| *fd)
            .collect();

        for fd in open {
            match self.close(fd) {
                Ok(()) => {}
                Err(Error::NotInitialized | Error::StaleProcess) => {
                    log_debug!("Dropped descriptor {fd} of a cleared store", fd: fd.0);
                }
                Err(err) => {
                    log_warn!("Failed to close descriptor {fd} on exit: {error}", fd: fd.0, error: err);
                }
            }
        }
    }
}
