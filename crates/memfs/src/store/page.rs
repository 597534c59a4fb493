use crate::error::{Error, Result};
use crate::page_arena::{self, PAGE_SIZE, PageID};
use crate::store::DataStore;

/// Entries per index block.
pub const ENTRIES: usize = 256;

/// Addressable pages: the single block plus ENTRIES double blocks.
/// With 4K pages this is 257MB.
pub const MAX_PAGES: usize = ENTRIES + ENTRIES * ENTRIES;

type Block = [Option<PageID>; ENTRIES];

/// A two-level page index over the shared page arena.
///
/// Pages `0..ENTRIES` live in the single block; the rest are addressed
/// through `double[(n - ENTRIES) / ENTRIES][(n - ENTRIES) % ENTRIES]`.
/// Index blocks are allocated on first write into their range.
pub struct PageStore {
    arena: page_arena::Handle,
    single: Option<Box<Block>>,
    double: Option<Box<[Option<Box<Block>>; ENTRIES]>>,
    pages_used: usize,
    last_entry_bytes_used: usize,
}

fn new_block() -> Box<Block> {
    Box::new([None; ENTRIES])
}

impl PageStore {
    pub fn new(arena: page_arena::Handle) -> Self {
        Self {
            arena,
            single: None,
            double: None,
            pages_used: 0,
            last_entry_bytes_used: 0,
        }
    }

    /// Number of pages spanned by the logical length.
    pub fn pages_used(&self) -> usize {
        self.pages_used
    }

    /// Number of pages currently taken from the arena.
    pub fn pages_held(&self) -> usize {
        let single = self.single.iter().flat_map(|b| b.iter());
        let double = self
            .double
            .iter()
            .flat_map(|outer| outer.iter().flatten())
            .flat_map(|b| b.iter());
        single.chain(double).filter(|e| e.is_some()).count()
    }

    fn lookup(&self, num: usize) -> Option<PageID> {
        if num < ENTRIES {
            return self.single.as_ref().and_then(|b| b[num]);
        }
        let entry = num - ENTRIES;
        self.double
            .as_ref()
            .and_then(|outer| outer[entry / ENTRIES].as_ref())
            .and_then(|b| b[entry % ENTRIES])
    }

    fn entry_mut(&mut self, num: usize) -> &mut Option<PageID> {
        if num < ENTRIES {
            return &mut self.single.get_or_insert_with(new_block)[num];
        }
        let entry = num - ENTRIES;
        let outer = self
            .double
            .get_or_insert_with(|| Box::new(std::array::from_fn(|_| None)));
        &mut outer[entry / ENTRIES].get_or_insert_with(new_block)[entry % ENTRIES]
    }

    /// Returns every held page to the arena and resets the store to empty.
    pub fn release_pages(&mut self) -> Result<()> {
        let handle = self.arena.clone();
        let mut arena = handle.try_borrow_mut()?;

        if let Some(block) = self.single.take() {
            for page in block.iter().flatten() {
                arena.return_page(*page);
            }
        }
        if let Some(outer) = self.double.take() {
            for block in outer.iter().flatten() {
                for page in block.iter().flatten() {
                    arena.return_page(*page);
                }
            }
        }

        self.pages_used = 0;
        self.last_entry_bytes_used = 0;
        Ok(())
    }
}

impl DataStore for PageStore {
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let size = self.size();
        if offset >= size {
            return Err(Error::EndOfFile);
        }

        let len = buf.len().min(size - offset);
        let arena = self.arena.try_borrow()?;

        let mut read = 0;
        let mut index = offset / PAGE_SIZE;
        let mut page_offset = offset % PAGE_SIZE;
        while read < len {
            let n = (PAGE_SIZE - page_offset).min(len - read);
            let dst = &mut buf[read..read + n];
            match self.lookup(index) {
                Some(page) => dst.copy_from_slice(&arena.page(page)[page_offset..page_offset + n]),
                // Hole left by a write past the end
                None => dst.fill(0),
            }
            read += n;
            index += 1;
            page_offset = 0;
        }

        Ok(read)
    }

    fn write(&mut self, offset: usize, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let end = offset
            .checked_add(buf.len())
            .ok_or(Error::FileTooLarge(u64::MAX))?;
        let needed = end.div_ceil(PAGE_SIZE);
        if needed > MAX_PAGES {
            return Err(Error::FileTooLarge(end as u64));
        }

        let handle = self.arena.clone();
        let mut arena = handle.try_borrow_mut()?;

        let mut written = 0;
        let mut page_offset = offset % PAGE_SIZE;
        for index in offset / PAGE_SIZE..needed {
            let slot = self.entry_mut(index);
            let id = match *slot {
                Some(id) => id,
                None => {
                    let id = arena.allocate_page();
                    // Recycled pages carry another file's bytes
                    arena.page_mut(id).fill(0);
                    *slot = Some(id);
                    id
                }
            };

            let n = (PAGE_SIZE - page_offset).min(buf.len() - written);
            arena.page_mut(id)[page_offset..page_offset + n]
                .copy_from_slice(&buf[written..written + n]);
            written += n;
            page_offset = 0;
        }

        if end > self.size() {
            self.pages_used = needed;
            self.last_entry_bytes_used = end - (needed - 1) * PAGE_SIZE;
        }

        Ok(written)
    }

    fn size(&self) -> usize {
        if self.pages_used == 0 {
            return 0;
        }
        (self.pages_used - 1) * PAGE_SIZE + self.last_entry_bytes_used
    }

    fn release(&mut self) {
        if let Err(err) = self.release_pages() {
            diagnostics::log_error!("Cannot return pages to the arena: {error}", error: err);
            panic!("Cannot return pages to the arena: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_arena::{EXP_GROW_LIMIT, PageArena};
    use crate::store::ArrayStore;
    use crate::testing::random_bytes;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn new_arena() -> page_arena::Handle {
        page_arena::Handle::new(PageArena::new(16, EXP_GROW_LIMIT))
    }

    #[test]
    fn test_empty_store() {
        let store = PageStore::new(new_arena());
        assert_eq!(store.size(), 0);
        let mut buf = [0u8; 4];
        assert_eq!(store.read(0, &mut buf), Err(Error::EndOfFile));
    }

    #[test]
    fn test_size_tracks_end_of_last_write() {
        let mut store = PageStore::new(new_arena());

        store.write(0, b"hello").unwrap();
        assert_eq!(store.size(), 5);

        store.write(PAGE_SIZE - 2, b"abcd").unwrap();
        assert_eq!(store.size(), PAGE_SIZE + 2);
        assert_eq!(store.pages_used(), 2);

        // Writing inside the current length does not shrink it
        store.write(1, b"x").unwrap();
        assert_eq!(store.size(), PAGE_SIZE + 2);

        // Exactly page aligned end
        store.write(0, &vec![7u8; 2 * PAGE_SIZE]).unwrap();
        assert_eq!(store.size(), 2 * PAGE_SIZE);
    }

    #[test]
    fn test_read_straddles_pages() {
        let mut store = PageStore::new(new_arena());
        let content = random_bytes(3 * PAGE_SIZE + 17);
        assert_eq!(store.write(0, &content).unwrap(), content.len());

        let mut buf = vec![0u8; PAGE_SIZE + 100];
        let start = PAGE_SIZE - 50;
        let n = store.read(start, &mut buf).unwrap();
        assert_eq!(n, buf.len());
        assert_eq!(&buf[..], &content[start..start + n]);
    }

    #[test]
    fn test_read_stops_at_size() {
        let mut store = PageStore::new(new_arena());
        store.write(0, b"0123456789").unwrap();

        let mut buf = [0u8; 32];
        assert_eq!(store.read(6, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"6789");
        assert_eq!(store.read(10, &mut buf), Err(Error::EndOfFile));
    }

    #[test]
    fn test_single_to_double_transition() {
        let mut store = PageStore::new(new_arena());
        let boundary = ENTRIES * PAGE_SIZE;
        let content = random_bytes(3 * PAGE_SIZE);
        let start = boundary - PAGE_SIZE - 123;

        store.write(start, &content).unwrap();
        assert_eq!(store.size(), start + content.len());
        assert!(store.double.is_some());

        let mut buf = vec![0u8; content.len()];
        assert_eq!(store.read(start, &mut buf).unwrap(), content.len());
        assert_eq!(buf, content);
    }

    #[test]
    fn test_holes_read_as_zero() {
        let mut store = PageStore::new(new_arena());
        store.write(3 * PAGE_SIZE + 10, b"tail").unwrap();
        assert_eq!(store.pages_held(), 1);

        let mut buf = vec![1u8; 3 * PAGE_SIZE + 14];
        assert_eq!(store.read(0, &mut buf).unwrap(), buf.len());
        assert!(buf[..3 * PAGE_SIZE + 10].iter().all(|b| *b == 0));
        assert_eq!(&buf[3 * PAGE_SIZE + 10..], b"tail");
    }

    #[test]
    fn test_recycled_pages_are_zeroed() {
        let arena = new_arena();

        let mut first = PageStore::new(arena.clone());
        first.write(0, &vec![0xAA; PAGE_SIZE]).unwrap();
        first.release_pages().unwrap();

        let mut second = PageStore::new(arena.clone());
        second.write(100, b"z").unwrap();
        let mut buf = vec![0xFF; 101];
        second.read(0, &mut buf).unwrap();
        assert!(buf[..100].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_release_returns_every_page() {
        let arena = new_arena();
        let mut store = PageStore::new(arena.clone());

        store.write(0, &random_bytes(4 * PAGE_SIZE)).unwrap();
        store.write((ENTRIES + 3) * PAGE_SIZE, b"far").unwrap();
        assert_eq!(arena.borrow().allocated(), 5);
        assert_eq!(store.pages_held(), 5);

        store.release();
        assert_eq!(arena.borrow().allocated(), 0);
        assert_eq!(store.size(), 0);
        assert_eq!(store.pages_held(), 0);
    }

    #[test]
    #[should_panic(expected = "Cannot return pages to the arena")]
    fn test_release_with_arena_borrowed_panics() {
        let arena = new_arena();
        let mut store = PageStore::new(arena.clone());
        store.write(0, b"held").unwrap();

        let _guard = arena.borrow();
        store.release();
    }

    #[test]
    fn test_write_beyond_capacity_fails_cleanly() {
        let arena = new_arena();
        let mut store = PageStore::new(arena.clone());
        let result = store.write(MAX_PAGES * PAGE_SIZE - 1, b"ab");
        assert_eq!(result, Err(Error::FileTooLarge((MAX_PAGES * PAGE_SIZE + 1) as u64)));
        assert_eq!(store.size(), 0);
        assert_eq!(arena.borrow().allocated(), 0);
    }

    #[test]
    fn test_matches_array_store() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut paged = PageStore::new(new_arena());
        let mut flat = ArrayStore::new();

        for _ in 0..200 {
            let offset = rng.gen_range(0..(ENTRIES + 4) * PAGE_SIZE);
            let len = rng.gen_range(0..3 * PAGE_SIZE);
            let data = random_bytes(len);
            assert_eq!(
                paged.write(offset, &data).unwrap(),
                flat.write(offset, &data).unwrap()
            );
            assert_eq!(paged.size(), flat.size());
        }

        for _ in 0..200 {
            let offset = rng.gen_range(0..paged.size());
            let mut a = vec![0u8; rng.gen_range(0..2 * PAGE_SIZE)];
            let mut b = a.clone();
            assert_eq!(paged.read(offset, &mut a), flat.read(offset, &mut b));
            assert_eq!(a, b);
        }
    }
}
