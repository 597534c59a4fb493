//! A POSIX-like file store held entirely in process memory.
//!
//! File content lives in 4K pages drawn from a shared [`PageArena`] and
//! indexed per inode by a two-level [`PageStore`]. Inodes count the
//! directory entries and open files that reference them and return their
//! pages when both counts reach zero. Each [`ProcState`] has its own
//! descriptor table and working directory over one shared [`GlobalState`].
//!
//! ```no_run
//! use memfs::{AccessFlag, Config, GlobalState, Mode, ProcState, Whence};
//!
//! # fn main() -> memfs::Result<()> {
//! let global = GlobalState::initialized(Config::default())?;
//! let mut proc = ProcState::new(&global)?;
//!
//! let fd = proc.open("greeting", AccessFlag::O_CREAT | AccessFlag::O_RDWR, Mode::user())?;
//! proc.write(fd, b"Hello, world!")?;
//! proc.seek(fd, 0, Whence::Set)?;
//!
//! let mut buf = [0u8; 13];
//! proc.read(fd, &mut buf)?;
//! proc.close(fd)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod dir;
mod entry_type;
mod error;
mod file;
mod flags;
mod global;
mod inode;
mod metadata;
mod page_arena;
mod path;
mod proc;
mod store;

pub use config::Config;
pub use dir::{DirID, ROOT_DIR};
pub use entry_type::EntryType;
pub use error::{Error, Result};
pub use file::Whence;
pub use flags::{AccessFlag, FileMode, Mode};
pub use global::{ArenaStats, GlobalState, StdStream};
pub use inode::InodeID;
pub use metadata::{DirEntry, FileStat};
pub use page_arena::{EXP_GROW_LIMIT, PAGE_SIZE, PageArena, PageID};
pub use path::split_path;
pub use proc::{FileDescriptor, ProcState};
pub use store::{ArrayStore, DataStore, ENTRIES, MAX_PAGES, PageStore};

/// Shared handle for a page arena
pub type PageArenaHandle = page_arena::Handle;

#[cfg(test)]
mod testing;
