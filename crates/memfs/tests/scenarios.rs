use memfs::{
    AccessFlag, Config, EntryType, Error, GlobalState, Mode, PAGE_SIZE, PageArena, ProcState,
    Whence,
};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

fn rw() -> AccessFlag {
    AccessFlag::O_CREAT | AccessFlag::O_RDWR
}

#[test]
fn test_hello_world() -> Result<(), Box<dyn std::error::Error>> {
    let global = GlobalState::initialized(Config::default())?;
    let mut proc = ProcState::new(&global)?;

    let fd = proc.open("file", rw(), Mode::user())?;
    assert_eq!(proc.write(fd, b"Hello, world!")?, 13);
    proc.seek(fd, 0, Whence::Set)?;

    let mut buf = [0u8; 13];
    assert_eq!(proc.read(fd, &mut buf)?, 13);
    assert_eq!(&buf, b"Hello, world!");
    assert_eq!(proc.read(fd, &mut buf), Err(Error::EndOfFile));

    proc.close(fd)?;
    Ok(())
}

#[test]
fn test_random_windows() -> Result<(), Box<dyn std::error::Error>> {
    let global = GlobalState::initialized(Config::default())?;
    let mut proc = ProcState::new(&global)?;
    let mut rng = StdRng::seed_from_u64(42);

    let mut content = vec![0u8; 9240];
    rng.fill_bytes(&mut content);

    let fd = proc.open("random", rw(), Mode::user())?;
    proc.write(fd, &content)?;

    let mut window = [0u8; 256];
    for _ in 0..5000 {
        let start = rng.gen_range(0..content.len() - window.len());
        proc.seek(fd, start as i64, Whence::Set)?;
        proc.read(fd, &mut window)?;
        assert_eq!(&window[..], &content[start..start + window.len()]);
    }
    Ok(())
}

#[test]
fn test_descriptor_reuse() -> Result<(), Box<dyn std::error::Error>> {
    let global = GlobalState::initialized(Config::default())?;
    let mut proc = ProcState::new(&global)?;

    let first = proc.open("a", rw(), Mode::user())?;
    let second = proc.open("b", rw(), Mode::user())?;
    proc.close(first)?;
    assert_eq!(proc.open("c", rw(), Mode::user())?, first);
    assert_ne!(second, first);
    Ok(())
}

#[test]
fn test_storage_released_after_last_reference() -> Result<(), Box<dyn std::error::Error>> {
    let global = GlobalState::initialized(Config::default())?;
    let mut proc = ProcState::new(&global)?;

    let fd = proc.open("data", rw(), Mode::user())?;
    proc.write(fd, &vec![7u8; 10 * PAGE_SIZE])?;
    proc.link("data", "alias")?;
    assert_eq!(global.stats()?.pages_allocated, 10);

    proc.unlink("data")?;
    proc.close(fd)?;
    assert_eq!(global.stats()?.pages_allocated, 10);

    proc.unlink("alias")?;
    let stats = global.stats()?;
    assert_eq!(stats.pages_allocated, 0);
    assert_eq!(stats.live_inodes, 0);
    Ok(())
}

#[test]
fn test_directory_tree() -> Result<(), Box<dyn std::error::Error>> {
    let global = GlobalState::initialized(Config::default())?;
    let mut proc = ProcState::new(&global)?;

    proc.mkdir("/usr")?;
    proc.mkdir("/usr/share")?;
    proc.chdir("/usr/share")?;
    let fd = proc.open("../readme", rw(), Mode::user())?;
    proc.close(fd)?;

    let listing = proc.read_dir("/usr")?;
    let kinds: Vec<_> = listing.iter().map(|e| (e.name.as_str(), e.kind)).collect();
    assert_eq!(
        kinds,
        vec![("readme", EntryType::File), ("share", EntryType::Directory)]
    );

    proc.rename("/usr/readme", "notes")?;
    assert_eq!(proc.stat("/usr/share/notes")?.kind, EntryType::File);
    Ok(())
}

#[test]
fn test_clear_and_reinit() -> Result<(), Box<dyn std::error::Error>> {
    let global = GlobalState::initialized(Config::default())?;
    let mut proc = ProcState::new(&global)?;
    let fd = proc.open("gone", rw(), Mode::user())?;
    proc.write(fd, b"transient")?;

    global.clear()?;
    assert_eq!(global.stats(), Err(Error::NotInitialized));
    assert_eq!(ProcState::new(&global).err(), Some(Error::NotInitialized));

    global.init()?;
    let mut fresh = ProcState::new(&global)?;
    assert_eq!(
        fresh.open("gone", AccessFlag::O_RDONLY, Mode::user()),
        Err(Error::PathNotFound("gone".to_string()))
    );
    assert_eq!(proc.write(fd, b"late"), Err(Error::StaleProcess));
    Ok(())
}

#[test]
fn test_arena_stack_discipline() {
    let mut arena = PageArena::new(8, memfs::EXP_GROW_LIMIT);
    let pages: Vec<_> = (0..8).map(|_| arena.allocate_page()).collect();
    for page in pages.iter().rev() {
        arena.return_page(*page);
    }
    let again: Vec<_> = (0..8).map(|_| arena.allocate_page()).collect();
    assert_eq!(pages, again);
}
