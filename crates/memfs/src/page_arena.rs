//! Page arena: a stack of fixed-size pages shared by every page store.
//!
//! Pages are handed out and taken back in LIFO order. The arena grows by
//! doubling until it holds `grow_limit` pages, then by `grow_limit` pages
//! at a time. Each growth step allocates one contiguous chunk and slices it
//! into pages.

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use diagnostics::{log_debug, log_error};

pub const PAGE_SIZE: usize = 4096;

/// Growth switches from doubling to linear at this many pages (256MB).
pub const EXP_GROW_LIMIT: usize = 65536;

pub type Page = [u8; PAGE_SIZE];

/// Index of a page inside its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageID(usize);

impl PageID {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for PageID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct PageArena {
    /// Number of pages currently handed out
    alloc: usize,
    /// Capacity in pages
    size: usize,
    grow_limit: usize,
    /// `stack[alloc..size]` are the free pages, top of stack at `alloc`
    stack: Vec<PageID>,
    chunks: Vec<Box<[Page]>>,
    /// First PageID of each chunk
    chunk_starts: Vec<usize>,
}

/// A handle for the shared arena.
#[derive(Clone)]
pub struct Handle(Rc<RefCell<PageArena>>);

impl Handle {
    pub fn new(arena: PageArena) -> Self {
        Self(Rc::new(RefCell::new(arena)))
    }
}

impl Deref for Handle {
    type Target = Rc<RefCell<PageArena>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn allocate_chunk(num: usize) -> Box<[Page]> {
    vec![[0u8; PAGE_SIZE]; num].into_boxed_slice()
}

impl PageArena {
    pub fn new(initial_pages: usize, grow_limit: usize) -> Self {
        let mut arena = PageArena {
            alloc: 0,
            size: 0,
            grow_limit,
            stack: Vec::new(),
            chunks: Vec::new(),
            chunk_starts: Vec::new(),
        };
        arena.add_pages(initial_pages);
        arena
    }

    pub fn allocated(&self) -> usize {
        self.alloc
    }

    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Hands out the page on top of the free stack, growing first if the
    /// stack is empty. The page is not zeroed.
    ///
    /// Aborts if the arena is still exhausted after growing.
    pub fn allocate_page(&mut self) -> PageID {
        if self.alloc >= self.size {
            self.grow();
        }
        if self.alloc >= self.size {
            log_error!("Page arena out of memory at {capacity} pages", capacity: self.size);
            panic!("Out of memory in page arena ({} pages)", self.size);
        }

        let page = self.stack[self.alloc];
        self.alloc += 1;
        page
    }

    /// Pushes `page` back on the free stack; it is the next page handed out.
    ///
    /// Aborts if no pages are allocated.
    pub fn return_page(&mut self, page: PageID) {
        if self.alloc == 0 {
            log_error!("Over-freeing page {page} in page arena", page: page.as_usize());
            panic!("Over-freeing pages in page arena");
        }

        self.alloc -= 1;
        self.stack[self.alloc] = page;
    }

    pub fn page(&self, id: PageID) -> &Page {
        let (chunk, index) = self.locate(id);
        &self.chunks[chunk][index]
    }

    pub fn page_mut(&mut self, id: PageID) -> &mut Page {
        let (chunk, index) = self.locate(id);
        &mut self.chunks[chunk][index]
    }

    fn locate(&self, id: PageID) -> (usize, usize) {
        // chunk_starts[0] == 0, so there is always a chunk at or before id
        let chunk = self.chunk_starts.partition_point(|&start| start <= id.0) - 1;
        (chunk, id.0 - self.chunk_starts[chunk])
    }

    fn grow(&mut self) {
        let new_size = (self.size * 2)
            .min(self.size + self.grow_limit)
            .max(1);
        log_debug!(
            "Growing page arena from {from} to {to} pages",
            from: self.size,
            to: new_size
        );
        self.add_pages(new_size - self.size);
    }

    fn add_pages(&mut self, num: usize) {
        if num == 0 {
            return;
        }
        let first = self.size;
        self.chunk_starts.push(first);
        self.chunks.push(allocate_chunk(num));
        self.stack.extend((first..first + num).map(PageID));
        self.size += num;
    }
}

impl std::fmt::Debug for PageArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageArena")
            .field("alloc", &self.alloc)
            .field("size", &self.size)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_return_is_lifo() {
        let mut arena = PageArena::new(8, EXP_GROW_LIMIT);

        let pages: Vec<_> = (0..5).map(|_| arena.allocate_page()).collect();
        assert_eq!(arena.allocated(), 5);

        for page in pages.iter().rev() {
            arena.return_page(*page);
        }
        assert_eq!(arena.allocated(), 0);

        let again: Vec<_> = (0..5).map(|_| arena.allocate_page()).collect();
        assert_eq!(pages, again);
    }

    #[test]
    fn test_most_recently_returned_page_is_reused() {
        let mut arena = PageArena::new(4, EXP_GROW_LIMIT);
        let a = arena.allocate_page();
        let b = arena.allocate_page();
        arena.return_page(a);
        assert_eq!(arena.allocate_page(), a);
        arena.return_page(b);
        assert_eq!(arena.allocate_page(), b);
    }

    #[test]
    fn test_growth_doubles_then_adds_limit() {
        let mut arena = PageArena::new(2, 4);
        assert_eq!(arena.capacity(), 2);

        for _ in 0..3 {
            arena.allocate_page();
        }
        assert_eq!(arena.capacity(), 4);

        for _ in 0..2 {
            arena.allocate_page();
        }
        // 4 pages is at the limit, so the next growth adds 4
        assert_eq!(arena.capacity(), 8);

        for _ in 0..4 {
            arena.allocate_page();
        }
        assert_eq!(arena.capacity(), 12);
        assert_eq!(arena.allocated(), 9);
    }

    #[test]
    fn test_empty_arena_grows() {
        let mut arena = PageArena::new(0, EXP_GROW_LIMIT);
        arena.allocate_page();
        assert_eq!(arena.capacity(), 1);
        arena.allocate_page();
        assert_eq!(arena.capacity(), 2);
    }

    #[test]
    fn test_pages_are_distinct_across_chunks() {
        let mut arena = PageArena::new(1, EXP_GROW_LIMIT);
        let pages: Vec<_> = (0..7).map(|_| arena.allocate_page()).collect();

        for (i, page) in pages.iter().enumerate() {
            arena.page_mut(*page).fill(i as u8);
        }
        for (i, page) in pages.iter().enumerate() {
            assert!(arena.page(*page).iter().all(|b| *b == i as u8));
        }
    }

    #[test]
    #[should_panic(expected = "Over-freeing")]
    fn test_over_free_aborts() {
        let mut arena = PageArena::new(2, EXP_GROW_LIMIT);
        let page = arena.allocate_page();
        arena.return_page(page);
        arena.return_page(page);
    }

    #[test]
    #[should_panic(expected = "Out of memory")]
    fn test_exhaustion_without_growth_aborts() {
        let mut arena = PageArena::new(2, 0);
        arena.allocate_page();
        arena.allocate_page();
        arena.allocate_page();
    }
}
