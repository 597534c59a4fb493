//! Test helpers shared by the unit and scenario tests.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::config::Config;
use crate::flags::{AccessFlag, Mode};
use crate::global::GlobalState;
use crate::proc::{FileDescriptor, ProcState};

/// `n` bytes of random content
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut data = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

/// A seeded generator, so failures reproduce
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A random offset in `0..len`
pub fn random_offset(rng: &mut StdRng, len: usize) -> usize {
    rng.gen_range(0..len)
}

/// An initialized store with one process rooted at `/`
pub fn new_proc() -> (GlobalState, ProcState) {
    let global = GlobalState::initialized(Config::default()).expect("default config is valid");
    let proc = ProcState::new(&global).expect("state is initialized");
    (global, proc)
}

pub fn create_rw(proc: &mut ProcState, path: &str) -> FileDescriptor {
    proc.open(path, AccessFlag::O_CREAT | AccessFlag::O_RDWR, Mode::user())
        .expect("create file")
}
