//! State shared by every process: the page and file arenas, the inode
//! table and the directory tree.
//!
//! A [`GlobalState`] is an explicit context handed to each [`ProcState`].
//! `init` and `clear` bracket its lifetime; processes created before a
//! `clear` are rejected afterwards, even if the state has been initialized
//! again.
//!
//! [`ProcState`]: crate::ProcState

use std::cell::RefCell;
use std::rc::Rc;

use diagnostics::{log_debug, log_info};

use crate::config::Config;
use crate::dir::DirectoryTable;
use crate::error::{Error, Result};
use crate::file::{FileArena, FileID, Whence};
use crate::flags::Mode;
use crate::inode::{Inode, InodeID, InodeTable};
use crate::page_arena::{self, PageArena};
use crate::store::PageStore;

/// Placeholders bound to descriptors 0, 1 and 2 of every process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Input,
    Output,
    Error,
}

impl StdStream {
    pub fn all() -> [StdStream; 3] {
        [StdStream::Input, StdStream::Output, StdStream::Error]
    }
}

/// Occupancy of the shared pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    pub pages_allocated: usize,
    pub pages_capacity: usize,
    pub files_in_use: usize,
    pub file_capacity: usize,
    pub live_inodes: usize,
}

pub(crate) struct State {
    pub(crate) pages: page_arena::Handle,
    pub(crate) files: FileArena,
    pub(crate) inodes: InodeTable,
    pub(crate) dirs: DirectoryTable,
}

impl State {
    fn new(config: &Config) -> Self {
        Self {
            pages: page_arena::Handle::new(PageArena::new(
                config.initial_pages,
                config.exp_grow_limit,
            )),
            files: FileArena::new(config.file_slots),
            inodes: InodeTable::new(),
            dirs: DirectoryTable::new(),
        }
    }

    /// Creates a page-backed inode. Its link count starts at one, for the
    /// entry the caller is about to insert.
    pub(crate) fn create_inode(&mut self, owner_id: u32, group_id: u32, mode: Mode) -> InodeID {
        let store = PageStore::new(self.pages.clone());
        let id = self
            .inodes
            .insert(|id| Inode::new(id, Box::new(store), owner_id, group_id, mode));
        self.inodes[id].increment_link_count();
        log_debug!("Created inode {inode} mode {mode}", inode: id.as_usize(), mode: mode.to_string());
        id
    }

    pub(crate) fn open_inode(&mut self, id: InodeID) -> FileID {
        self.files.allocate(&mut self.inodes[id])
    }

    pub(crate) fn read_file(&mut self, file: FileID, buf: &mut [u8]) -> Result<usize> {
        let id = self.files[file].inode()?;
        self.files[file].read(&mut self.inodes[id], buf)
    }

    pub(crate) fn write_file(&mut self, file: FileID, buf: &[u8]) -> Result<usize> {
        let id = self.files[file].inode()?;
        self.files[file].write(&mut self.inodes[id], buf)
    }

    pub(crate) fn seek_file(&mut self, file: FileID, offset: i64, whence: Whence) -> Result<i64> {
        let id = self.files[file].inode()?;
        let size = self.inodes[id].size();
        self.files[file].seek(size, offset, whence)
    }

    pub(crate) fn file_inode(&self, file: FileID) -> Result<&Inode> {
        let id = self.files[file].inode()?;
        Ok(&self.inodes[id])
    }

    /// Closes the file, returns its slot and drops its hold on the inode.
    pub(crate) fn close_file(&mut self, file: FileID) -> Result<()> {
        let id = self.files[file].close()?;
        self.files.release(file);
        if self.inodes[id].decrement_file_count() {
            self.reap(id);
        }
        Ok(())
    }

    pub(crate) fn link_inode(&mut self, id: InodeID) {
        self.inodes[id].increment_link_count();
    }

    pub(crate) fn unlink_inode(&mut self, id: InodeID) {
        if self.inodes[id].decrement_link_count() {
            self.reap(id);
        }
    }

    fn reap(&mut self, id: InodeID) {
        _ = self.inodes.remove(id);
    }

    fn stats(&self) -> Result<ArenaStats> {
        let pages = self.pages.try_borrow()?;
        Ok(ArenaStats {
            pages_allocated: pages.allocated(),
            pages_capacity: pages.capacity(),
            files_in_use: self.files.in_use(),
            file_capacity: self.files.capacity(),
            live_inodes: self.inodes.len(),
        })
    }
}

struct Slot {
    config: Config,
    /// Bumped by every successful init
    generation: u64,
    state: Option<State>,
}

/// A handle for the shared state. Clones refer to the same state.
#[derive(Clone)]
pub struct GlobalState(Rc<RefCell<Slot>>);

impl Default for GlobalState {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for GlobalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.try_borrow() {
            Ok(slot) => f
                .debug_struct("GlobalState")
                .field("generation", &slot.generation)
                .field("initialized", &slot.state.is_some())
                .finish(),
            Err(_) => f.write_str("GlobalState(<borrowed>)"),
        }
    }
}

impl GlobalState {
    /// An uninitialized state. Call [`GlobalState::init`] before use.
    pub fn new(config: Config) -> Self {
        Self(Rc::new(RefCell::new(Slot {
            config,
            generation: 0,
            state: None,
        })))
    }

    /// Creates and initializes a state in one step.
    pub fn initialized(config: Config) -> Result<Self> {
        let global = Self::new(config);
        global.init()?;
        Ok(global)
    }

    /// Builds the arenas and the root directory. Does nothing if already
    /// initialized.
    pub fn init(&self) -> Result<()> {
        diagnostics::init_diagnostics();

        let mut slot = self.0.try_borrow_mut()?;
        if slot.state.is_some() {
            return Ok(());
        }
        slot.config.validate()?;

        let state = State::new(&slot.config);
        slot.generation += 1;
        slot.state = Some(state);
        log_info!(
            "Initialized file store generation {generation} with {files} file slots",
            generation: slot.generation,
            files: slot.config.file_slots
        );
        Ok(())
    }

    /// Discards the arenas, inodes and directories. Processes created before
    /// this call can no longer operate.
    pub fn clear(&self) -> Result<()> {
        let mut slot = self.0.try_borrow_mut()?;
        if let Some(state) = slot.state.take() {
            log_info!(
                "Cleared file store generation {generation} holding {inodes} inodes",
                generation: slot.generation,
                inodes: state.inodes.len()
            );
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.0.try_borrow().is_ok_and(|slot| slot.state.is_some())
    }

    pub fn config(&self) -> Result<Config> {
        Ok(self.0.try_borrow()?.config.clone())
    }

    pub fn stats(&self) -> Result<ArenaStats> {
        let slot = self.0.try_borrow()?;
        slot.state.as_ref().ok_or(Error::NotInitialized)?.stats()
    }

    /// The generation a new process binds to.
    pub(crate) fn generation(&self) -> Result<u64> {
        let slot = self.0.try_borrow()?;
        if slot.state.is_none() {
            return Err(Error::NotInitialized);
        }
        Ok(slot.generation)
    }

    /// Runs `op` against the state, provided it is the generation the
    /// caller was created in.
    pub(crate) fn with_state<F, T>(&self, generation: u64, op: F) -> Result<T>
    where
        F: FnOnce(&mut State) -> Result<T>,
    {
        let mut slot = self.0.try_borrow_mut()?;
        let current = slot.generation;
        let state = slot.state.as_mut().ok_or(Error::NotInitialized)?;
        if generation != current {
            log_debug!(
                "Rejecting process from generation {old}, current is {current}",
                old: generation,
                current: current
            );
            return Err(Error::StaleProcess);
        }
        op(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let global = GlobalState::new(Config::default());
        assert!(!global.is_initialized());
        assert_eq!(global.stats(), Err(Error::NotInitialized));

        global.init().unwrap();
        let generation = global.generation().unwrap();
        global.init().unwrap();
        assert_eq!(global.generation().unwrap(), generation);
        assert!(global.is_initialized());
    }

    #[test]
    fn test_clear_invalidates_generation() {
        let global = GlobalState::initialized(Config::default()).unwrap();
        let old = global.generation().unwrap();

        global.clear().unwrap();
        assert!(!global.is_initialized());
        assert_eq!(global.generation(), Err(Error::NotInitialized));
        assert_eq!(global.with_state(old, |_| Ok(())), Err(Error::NotInitialized));

        global.init().unwrap();
        assert_ne!(global.generation().unwrap(), old);
        assert_eq!(global.with_state(old, |_| Ok(())), Err(Error::StaleProcess));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            max_descriptors: 0,
            ..Config::default()
        };
        assert!(matches!(
            GlobalState::initialized(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_close_releases_unlinked_inode() {
        let global = GlobalState::initialized(Config::default()).unwrap();
        let generation = global.generation().unwrap();

        global
            .with_state(generation, |state| {
                let id = state.create_inode(0, 0, Mode::user());
                let file = state.open_inode(id);
                state.write_file(file, &[1u8; 10000])?;
                assert_eq!(state.stats()?.pages_allocated, 3);

                state.unlink_inode(id);
                assert_eq!(state.stats()?.live_inodes, 1);

                state.close_file(file)?;
                let stats = state.stats()?;
                assert_eq!(stats.pages_allocated, 0);
                assert_eq!(stats.live_inodes, 0);
                assert_eq!(stats.files_in_use, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_reentrant_use_is_a_borrow_error() {
        let global = GlobalState::initialized(Config::default()).unwrap();
        let generation = global.generation().unwrap();
        let inner = global.clone();
        let result = global.with_state(generation, |_| inner.stats());
        assert!(matches!(result, Err(Error::Borrow(_))));
    }
}
