//! Byte stores that back inode content.
//!
//! [`PageStore`] is the primary implementation; [`ArrayStore`] is a flat
//! alternative with the same contract.

mod array;
mod page;

pub use array::ArrayStore;
pub use page::{ENTRIES, MAX_PAGES, PageStore};

use crate::error::Result;

/// Offset-addressed byte storage.
pub trait DataStore {
    /// Reads into `buf` starting at `offset`, returning the number of bytes
    /// copied. Fails with `EndOfFile` if `offset >= size()`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize>;

    /// Writes `buf` starting at `offset`, extending the store as needed.
    fn write(&mut self, offset: usize, buf: &[u8]) -> Result<usize>;

    /// Logical length in bytes.
    fn size(&self) -> usize;

    /// Gives back any pooled storage. Called once, when the owner is destroyed.
    fn release(&mut self) {}
}
